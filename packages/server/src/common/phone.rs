/// Validate E.164 phone format: `+` then 7-15 digits, no leading zero.
pub fn is_valid_e164(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix('+') else {
        return false;
    };
    if !(7..=15).contains(&digits.len()) {
        return false;
    }
    let mut chars = digits.chars();
    match chars.next() {
        Some(c) if ('1'..='9').contains(&c) => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_digit())
}
