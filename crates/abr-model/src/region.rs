/// Region table: lowercase code → TLD used to build provider URLs.
/// Unknown codes fall back to `us`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Region {
    Us,
    Ca,
    Uk,
    Au,
    Fr,
    De,
    Jp,
    It,
    In,
    Es,
    Br,
}

impl Region {
    pub fn from_code(code: &str) -> Region {
        match code.to_ascii_lowercase().as_str() {
            "ca" => Region::Ca,
            "uk" => Region::Uk,
            "au" => Region::Au,
            "fr" => Region::Fr,
            "de" => Region::De,
            "jp" => Region::Jp,
            "it" => Region::It,
            "in" => Region::In,
            "es" => Region::Es,
            "br" => Region::Br,
            _ => Region::Us,
        }
    }

    pub fn tld(&self) -> &'static str {
        match self {
            Region::Us => ".com",
            Region::Ca => ".ca",
            Region::Uk => ".co.uk",
            Region::Au => ".com.au",
            Region::Fr => ".fr",
            Region::De => ".de",
            Region::Jp => ".co.jp",
            Region::It => ".it",
            Region::In => ".in",
            Region::Es => ".es",
            Region::Br => ".com.br",
        }
    }

    /// The lowercase two-letter code this variant was parsed from, used
    /// to round-trip `region=<code>` query parameters.
    pub fn code(&self) -> &'static str {
        match self {
            Region::Us => "us",
            Region::Ca => "ca",
            Region::Uk => "uk",
            Region::Au => "au",
            Region::Fr => "fr",
            Region::De => "de",
            Region::Jp => "jp",
            Region::It => "it",
            Region::In => "in",
            Region::Es => "es",
            Region::Br => "br",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_code_falls_back_to_us() {
        assert_eq!(Region::from_code("xx").tld(), ".com");
        assert_eq!(Region::from_code("").tld(), ".com");
    }

    #[test]
    fn known_codes_map_to_their_tld() {
        assert_eq!(Region::from_code("UK").tld(), ".co.uk");
        assert_eq!(Region::from_code("jp").tld(), ".co.jp");
    }
}
