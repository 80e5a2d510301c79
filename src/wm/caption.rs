//! Caption helpers: cleaning declared names and keeping them apart.

/// Replace characters decorations cannot draw with spaces
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if is_printable(c) { c } else { ' ' })
        .collect()
}

/// False for control, format, separator, private use and noncharacter
/// code points
fn is_printable(c: char) -> bool {
    if c.is_control() {
        return false;
    }
    let cp = u32::from(c);
    // Noncharacters end every plane
    if cp & 0xFFFE == 0xFFFE || (0xFDD0..=0xFDEF).contains(&cp) {
        return false;
    }
    !matches!(
        cp,
        0x00AD
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x0890..=0x0891
            | 0x08E2
            | 0x180E
            | 0x200B..=0x200F
            | 0x2028..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xE000..=0xF8FF
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0x110BD
            | 0x110CD
            | 0x13430..=0x1343F
            | 0x1BCA0..=0x1BCA3
            | 0x1D173..=0x1D17A
            | 0xE0001
            | 0xE0020..=0xE007F
            | 0xF0000..=0x10FFFF
    )
}

/// Suffix that makes `base` differ from every caption in `taken`
///
/// `None` when `base` itself is free. Otherwise the lowest `" <n>"`,
/// n >= 2, whose full caption nobody shows yet.
pub fn unique_suffix<'a, I>(base: &str, taken: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: Vec<&str> = taken.into_iter().collect();
    if !taken.contains(&base) {
        return None;
    }
    (2u32..)
        .map(|i| format!(" <{}>", i))
        .find(|suffix| {
            let caption = format!("{}{}", base, suffix);
            !taken.contains(&caption.as_str())
        })
}
