/// Decides whether a license short name permits reuse.
pub trait LicenseGate {
    fn is_acceptable(&self, license: &str) -> bool;
}

/// Case-sensitive prefix matching against license short names, so version
/// suffixes such as "CC BY-SA 4.0" pass on "CC BY-SA".
#[derive(Debug, Clone)]
pub struct AllowList {
    pub allowed: Vec<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        // "CC BY " keeps its trailing space: a bare "CC BY" prefix would also
        // admit "CC BY-NC" and "CC BY-ND".
        AllowList {
            allowed: [
                "CC0",
                "Public domain",
                "Public Domain",
                "CC BY ",
                "CC BY-SA",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

fn matches(license: &str, entry: &str) -> bool {
    !entry.is_empty() && (license == entry || license.starts_with(entry))
}

impl LicenseGate for AllowList {
    fn is_acceptable(&self, license: &str) -> bool {
        let license = license.trim();

        !license.is_empty() && self.allowed.iter().any(|entry| matches(license, entry))
    }
}

pub const UNKNOWN_ARTIST: &str = "Unknown";
pub const UNKNOWN_LICENSE: &str = "Public domain/CC";

/// Credit line written next to the image URL.
pub fn build_attribution(artist: Option<&str>, license: &str, unknown_artist: &str) -> String {
    let artist = artist
        .map(str::trim)
        .filter(|artist| !artist.is_empty())
        .unwrap_or(unknown_artist);

    let license = match license.trim() {
        "" => UNKNOWN_LICENSE,
        license => license,
    };

    format!("{} — {} (via Wikimedia Commons)", artist, license)
}
