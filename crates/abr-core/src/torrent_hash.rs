use bendy::decoding::Decoder;
use sha1::{Digest, Sha1};

/// Extracts the info-hash from a magnet URI's `xt=urn:btih:<hex>`
/// parameter. Case-insensitive; returns the hash lowercased.
pub fn hash_from_magnet(magnet: &str) -> Option<String> {
    magnet.split('&').chain(magnet.split('?')).find_map(|part| {
        let part = part.strip_prefix("xt=urn:btih:").or_else(|| {
            part.split_once("xt=urn:btih:").map(|(_, rest)| rest)
        })?;
        let hex: String = part.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        if hex.len() == 40 { Some(hex.to_lowercase()) } else { None }
    })
}

/// Computes the SHA-1 info-hash of a raw `.torrent` file by re-hashing
/// the bencoded `info` dictionary's original bytes.
pub fn hash_from_torrent_bytes(bytes: &[u8]) -> Option<String> {
    let mut decoder = Decoder::new(bytes);
    let object = decoder.next_object().ok().flatten()?;
    let mut dict = object.try_into_dictionary().ok()?;
    while let Ok(Some(pair)) = dict.next_pair() {
        match pair {
            (b"info", value) => {
                let mut infodict = value.try_into_dictionary().ok()?;
                // drain the info dict's own pairs so `into_raw` below
                // yields this dictionary's bytes, not the outer one.
                while infodict.next_pair().ok().flatten().is_some() {}
                let raw = infodict.into_raw().ok()?;
                let mut hasher = Sha1::new();
                hasher.update(raw);
                return Some(format!("{:x}", hasher.finalize()));
            }
            _ => continue,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hash_from_magnet_uri() {
        let magnet = "magnet:?xt=urn:btih:AABBCCDDEEFF00112233445566778899AABBCCDD&dn=Book";
        assert_eq!(
            hash_from_magnet(magnet),
            Some("aabbccddeeff00112233445566778899aabbccdd".to_string())
        );
    }

    #[test]
    fn returns_none_for_malformed_magnet() {
        assert_eq!(hash_from_magnet("magnet:?dn=Book"), None);
    }
}
