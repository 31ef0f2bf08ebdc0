//! Identifier cleaning and collision-free allocation.
//!
//! Parameter and group ids are lower-case alphanumeric strings. When a
//! desired id is already taken, a spreadsheet-style letter suffix is
//! appended (`a`, `b`, ..., `z`, `aa`, `ab`, ...).

/// Namespace tag prefixed to every identifier derived from a workflow input.
pub const RAW_INPUT_PREFIX: &str = "comfyrawworkflowinput";

/// Convert a non-negative integer to spreadsheet-column letters.
///
/// ```
/// use templater_core::naming::number_to_letters;
///
/// assert_eq!(number_to_letters(0), "a");
/// assert_eq!(number_to_letters(25), "z");
/// assert_eq!(number_to_letters(26), "aa");
/// assert_eq!(number_to_letters(701), "zz");
/// ```
pub fn number_to_letters(n: u64) -> String {
    // Bijective base-26 over n + 1.
    let mut remaining = u128::from(n) + 1;
    let mut letters = Vec::new();
    while remaining > 0 {
        remaining -= 1;
        letters.push(char::from(b'a' + (remaining % 26) as u8));
        remaining /= 26;
    }
    letters.iter().rev().collect()
}

/// Lower-case a name and strip everything outside `[a-z0-9]`.
///
/// ```
/// use templater_core::naming::clean_param_name;
///
/// assert_eq!(clean_param_name("My Seed #2"), "myseed2");
/// assert_eq!(clean_param_name("comfy_sampler"), "comfysampler");
/// ```
pub fn clean_param_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Return `base` if unused, otherwise `base` plus the first letter suffix
/// that is not in use.
pub fn unique_id(base: &str, is_used: impl Fn(&str) -> bool) -> String {
    if !is_used(base) {
        return base.to_string();
    }
    let mut counter = 0u64;
    loop {
        let candidate = format!("{base}{}", number_to_letters(counter));
        if !is_used(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
