//! Prompt builders for the translation loop agents.

use crate::language::Language;
use crate::style::StyleGuide;

/// Build the translator prompt. The revision variant quotes the prior
/// attempt and the reviewer's feedback.
pub fn build_translation_prompt(
    text: &str,
    language: Language,
    style: &StyleGuide,
    prior: Option<&str>,
    feedback: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are a professional translator specialising in fiction.\n\
         You work with {language} to English translations and are highly \
         proficient in localisation. Prioritise fluency while maintaining \
         semantic meaning.\n\n\
         Style guide:\n{style}\n\
         Terms marked `term [Translation Memory canonical]` are locked: keep \
         the given rendering and drop the bracketed marker from your output.\n\n\
         Translate the following {language} text to English.\n\
         Text:\n{text}\n",
        language = language,
        style = style.render(),
    );

    match (prior, feedback) {
        (Some(prior), Some(feedback)) => {
            prompt.push_str(&format!(
                "\nYour prior translation was:\n{prior}\n\
                 Your feedback was:\n{feedback}\n\
                 With this feedback incorporated, create a richer response.\n\
                 Your updated translation, incorporating feedback:"
            ));
        }
        _ => prompt.push_str("\nTranslation:"),
    }
    prompt
}

/// Build the junior editor's review prompt
pub fn build_review_prompt(source: &str, translation: &str, approval_marker: &str) -> String {
    format!(
        "Evaluate the quality of the following translation for the text.\n\
         Be highly critical in your evaluation, you only want the very best.\n\
         Be harsh but reasonable.\n\
         If it is of high enough quality return the words \"{approval_marker}\", \
         review by the following:\n\
         - readability\n\
         - fluency\n\
         - reading level\n\
         - consistency of terminology\n\
         - semantic accuracy\n\
         Produce a list of specific errors/suggestions with justifications \
         and avoid a general conclusion.\n\
         Original Text: {source}\n\
         Translation for assessment: {translation}"
    )
}

/// Build the fluency editor's prompt over segment-tagged text.
///
/// The editor sees only the translation; the tags are its alignment map.
pub fn build_fluency_prompt(tagged: &str) -> String {
    format!(
        "You are a professional proofreader.\n\
         Your job is to read for rhythm, voice, and narrative flow.\n\
         You will refine sentence structure, word choice, and aesthetics of \
         form to enhance the reader's immersion in the world the author has \
         built, keeping the author's voice consistent and strong.\n\
         Create as many improvements as you can.\n\n\
         The text is divided into segments inside <segment N> ... </segment N> tags.\n\
         For any segment where you see room for improvement, output ONLY the \
         improved version inside the same tags.\n\
         Do not output unchanged segments. Do not add explanations or commentary.\n\
         It is acceptable to split a long sentence into multiple sentences \
         inside a segment if it improves clarity.\n\n\
         Example:\n\
         Input:\n\
         <segment 5>\n\
         He placed the card upon the desk and once again closed his eyes, \
         silently reciting in his heart a prayer.\n\
         </segment 5>\n\n\
         Output:\n\
         <segment 5>\n\
         Placing the card upon the desk, he closed his eyes once more, \
         silently reciting a prayer in his heart.\n\
         </segment 5>\n\n\
         The input of tagged text for proofreading is below, output in the \
         formatting described above:\n{tagged}"
    )
}
