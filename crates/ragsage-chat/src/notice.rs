//! Continuation notice appended to answers cut off by a length limit.

pub const ENGLISH_NOTICE: &str = "...\nFor the content length reason, it stopped, continue?";
pub const LOCALIZED_NOTICE: &str = "······\n由于长度的原因，回答被截断了，要继续吗？";

/// CJK ideographs, kana, hangul and full-width punctuation.
pub fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3000}'..='\u{303F}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FFEF}'
        | '\u{20000}'..='\u{2A6DF}'
    )
}

pub fn is_english(text: &str) -> bool {
    !text.chars().any(is_cjk)
}

/// Pick the notice matching the language of the partial answer.
pub fn continuation_notice(partial_answer: &str) -> &'static str {
    if is_english(partial_answer) {
        ENGLISH_NOTICE
    } else {
        LOCALIZED_NOTICE
    }
}
