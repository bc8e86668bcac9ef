//! Azure naming rules, usable as schema string checks.

fn is_name_char(c: char, extra: &[char]) -> bool {
    c.is_ascii_alphanumeric() || extra.contains(&c)
}

fn check_length(kind: &str, value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(format!(
            "{} must be between {} and {} characters, got {}",
            kind, min, max, len
        ));
    }
    Ok(())
}

fn check_chars(kind: &str, value: &str, extra: &[char], allowed: &str) -> Result<(), String> {
    if let Some(bad) = value.chars().find(|c| !is_name_char(*c, extra)) {
        return Err(format!("{} may only contain {}, found {:?}", kind, allowed, bad));
    }
    Ok(())
}

fn check_ends(kind: &str, value: &str) -> Result<(), String> {
    let first = value.chars().next();
    let last = value.chars().last();
    if !first.is_some_and(|c| c.is_ascii_alphanumeric())
        || !last.is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err(format!("{} must start and end with a letter or number", kind));
    }
    Ok(())
}

/// Digital Twins instance: 3-63 alphanumerics and hyphens, alphanumeric at both ends.
pub fn digital_twins_instance_name(value: &str) -> Result<(), String> {
    let kind = "Digital Twins instance name";
    check_length(kind, value, 3, 63)?;
    check_chars(kind, value, &['-'], "letters, numbers and hyphens")?;
    check_ends(kind, value)
}

/// Digital Twins endpoint: 2-49 alphanumerics and hyphens, alphanumeric at both ends.
pub fn digital_twins_endpoint_name(value: &str) -> Result<(), String> {
    let kind = "Digital Twins endpoint name";
    check_length(kind, value, 2, 49)?;
    check_chars(kind, value, &['-'], "letters, numbers and hyphens")?;
    check_ends(kind, value)
}

/// Event Hub namespace: 6-50 characters, starts with a letter, ends with a
/// letter or number.
pub fn eventhub_namespace_name(value: &str) -> Result<(), String> {
    let kind = "Event Hub namespace name";
    check_length(kind, value, 6, 50)?;
    check_chars(kind, value, &['-'], "letters, numbers and hyphens")?;
    if !value.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(format!("{} must start with a letter", kind));
    }
    if !value.ends_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(format!("{} must end with a letter or number", kind));
    }
    Ok(())
}

/// Event Hub: 1-256 alphanumerics, periods, hyphens and underscores,
/// alphanumeric at both ends.
pub fn eventhub_name(value: &str) -> Result<(), String> {
    let kind = "Event Hub name";
    check_length(kind, value, 1, 256)?;
    check_chars(
        kind,
        value,
        &['.', '-', '_'],
        "letters, numbers, periods, hyphens and underscores",
    )?;
    check_ends(kind, value)
}

/// Consumer group: `$Default`, or 1-50 alphanumerics, periods, hyphens and underscores.
pub fn consumer_group_name(value: &str) -> Result<(), String> {
    if value == "$Default" {
        return Ok(());
    }
    let kind = "consumer group name";
    check_length(kind, value, 1, 50)?;
    check_chars(kind, value, &['.', '-', '_'], "letters, numbers, periods, hyphens and underscores")
}

/// Shared access authorization rule: 1-50 alphanumerics, periods, hyphens
/// and underscores.
pub fn authorization_rule_name(value: &str) -> Result<(), String> {
    let kind = "authorization rule name";
    check_length(kind, value, 1, 50)?;
    check_chars(kind, value, &['.', '-', '_'], "letters, numbers, periods, hyphens and underscores")
}

/// Geo-DR alias: 1-50 alphanumerics and hyphens.
pub fn disaster_recovery_alias(value: &str) -> Result<(), String> {
    let kind = "disaster recovery alias";
    check_length(kind, value, 1, 50)?;
    check_chars(kind, value, &['-'], "letters, numbers and hyphens")
}

/// Schema group: 1-256 alphanumerics, periods, hyphens and underscores.
pub fn schema_group_name(value: &str) -> Result<(), String> {
    let kind = "schema group name";
    check_length(kind, value, 1, 256)?;
    check_chars(kind, value, &['.', '-', '_'], "letters, numbers, periods, hyphens and underscores")
}
