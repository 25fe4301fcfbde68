//! Closed stop-word vocabularies
//!
//! Articles, pronouns, common function words and platform boilerplate that
//! carry no topical signal in video titles.

use super::Language;

const VIETNAMESE: &[&str] = &[
    "và", "là", "của", "có", "một", "cho", "không", "được", "với", "trong", "để", "khi", "thì",
    "mà", "tại", "này", "đã", "ra", "về", "từ", "cách", "làm", "video", "youtube", "phần", "tập",
    "đầy", "đủ", "mới", "nhất", "hot", "trend", "top", "thử", "xem", "review", "hướng", "dẫn",
    "shorts", "tiktok", "cùng", "đến", "như", "những", "cũng", "sẽ", "đó", "đây", "chỉ", "còn",
    "lại", "thêm", "tôi", "bạn",
];

const ENGLISH: &[&str] = &[
    "a", "an", "and", "the", "is", "in", "it", "of", "for", "on", "with", "to", "this", "that",
    "how", "video", "youtube", "new", "part", "episode", "hot", "top", "trending", "shorts", "vs",
    "ft", "i", "me", "my", "you", "your", "he", "she", "we", "our", "they", "them", "what", "who",
    "when", "where", "why", "official", "music", "trailer",
];

/// True if `token` (already lowercased) is a stop word for `lang`
pub(crate) fn is_stop_word(lang: Language, token: &str) -> bool {
    let words = match lang {
        Language::Vi => VIETNAMESE,
        Language::En => ENGLISH,
    };
    words.contains(&token)
}
