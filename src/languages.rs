/// Source-language sentinel meaning "detect from the text".
pub const AUTO: &str = "auto";

/// Target used for Paraphrase mode when the source is `auto`.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A supported language: ISO 639-1 code, English name, native name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
    pub native: &'static str,
}

const fn lang(code: &'static str, name: &'static str, native: &'static str) -> Language {
    Language { code, name, native }
}

pub const LANGUAGES: &[Language] = &[
    lang("en", "English", "English"),
    lang("ja", "Japanese", "日本語"),
    lang("ko", "Korean", "한국어"),
    lang("ar", "Arabic", "العربية"),
    lang("id", "Bahasa Indonesia", "Bahasa Indonesia"),
    lang("bn", "Bengali", "বাংলা"),
    lang("bg", "Bulgarian", "Български"),
    lang("zh", "Chinese", "中文"),
    lang("hr", "Croatian", "Hrvatski"),
    lang("cs", "Czech", "Čeština"),
    lang("da", "Danish", "Dansk"),
    lang("nl", "Dutch", "Nederlands"),
    lang("et", "Estonian", "Eesti"),
    lang("fa", "Farsi", "فارسی"),
    lang("fi", "Finnish", "Suomi"),
    lang("fr", "French", "Français"),
    lang("de", "German", "Deutsch"),
    lang("gu", "Gujarati", "ગુજરાતી"),
    lang("el", "Greek", "Ελληνικά"),
    lang("he", "Hebrew", "עברית"),
    lang("hi", "Hindi", "हिन्दी"),
    lang("hu", "Hungarian", "Magyar"),
    lang("it", "Italian", "Italiano"),
    lang("kn", "Kannada", "ಕನ್ನಡ"),
    lang("lv", "Latvian", "Latviešu"),
    lang("lt", "Lithuanian", "Lietuvių"),
    lang("ml", "Malayalam", "മലയാളം"),
    lang("mr", "Marathi", "मराठी"),
    lang("no", "Norwegian", "Norsk"),
    lang("pl", "Polish", "Polski"),
    lang("pt", "Portuguese", "Português"),
    lang("ro", "Romanian", "Română"),
    lang("ru", "Russian", "Русский"),
    lang("sr", "Serbian", "Српски"),
    lang("sk", "Slovak", "Slovenčina"),
    lang("sl", "Slovenian", "Slovenščina"),
    lang("es", "Spanish", "Español"),
    lang("sw", "Swahili", "Kiswahili"),
    lang("sv", "Swedish", "Svenska"),
    lang("ta", "Tamil", "தமிழ்"),
    lang("te", "Telugu", "తెలుగు"),
    lang("th", "Thai", "ไทย"),
    lang("tr", "Turkish", "Türkçe"),
    lang("uk", "Ukrainian", "Українська"),
    lang("ur", "Urdu", "اردو"),
    lang("vi", "Vietnamese", "Tiếng Việt"),
];

pub fn find(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code == code)
}

pub fn is_known(code: &str) -> bool {
    find(code).is_some()
}

/// Valid as a source selection: a known code or `auto`.
pub fn is_valid_source(code: &str) -> bool {
    code == AUTO || is_known(code)
}
