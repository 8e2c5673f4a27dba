//! Configuration access port trait.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// All `(key, value)` pairs of a section, sorted by key. Empty if the
    /// section is absent.
    fn get_section(&self, section: &str) -> Vec<(String, String)>;
}
