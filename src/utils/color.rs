/// Stable HSL colour derived from a string, used to tint tags and calendars.
///
/// The hash is `hash * 31 + c` over UTF-16 code units, with the JavaScript
/// number semantics the web client uses: the shift truncates to 32 bits but
/// the running value does not, so long strings keep the same hue on both
/// sides.
pub fn color_from_string(input: &str) -> String {
    let mut hash: i64 = 0;
    for unit in input.encode_utf16() {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        hash = i64::from(unit).wrapping_add(shifted.wrapping_sub(hash));
    }
    let hue = hash.unsigned_abs() % 360;
    format!("hsl({}, 65%, 55%)", hue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_is_stable() {
        assert_eq!(color_from_string("trabalho"), color_from_string("trabalho"));
    }

    #[test]
    fn test_known_values() {
        assert_eq!(color_from_string(""), "hsl(0, 65%, 55%)");
        // "a" hashes to 97
        assert_eq!(color_from_string("a"), "hsl(97, 65%, 55%)");
        // "ab" hashes to 97 * 31 + 98 = 3105
        assert_eq!(color_from_string("ab"), "hsl(225, 65%, 55%)");
        assert_eq!(color_from_string("pessoal"), "hsl(75, 65%, 55%)");
    }

    #[test]
    fn test_running_hash_is_not_truncated() {
        // Hashes to 8191926717, past i32; a wrapped hash would give hue 155
        assert_eq!(color_from_string("Reunião de equipe"), "hsl(357, 65%, 55%)");
    }
}
