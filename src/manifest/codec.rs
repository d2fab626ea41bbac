// src/manifest/codec.rs

//! Conversion between manifest elements and the data model
//!
//! Each function takes the `VersionRules` of the document being read or
//! written; nothing here knows about version numbers directly.

use super::permissions::{format_permission_string, parse_permission_string};
use super::{
    AccessEntry, Accounts, AceStyle, DatasetRef, GroupRecord, GroupingRef, ModuleSection,
    PrincipalKind, PrincipalRef, Property, ResourceRecord, TimestampStyle, UserRecord,
    VersionRules,
};
use crate::error::{Error, Result};
use crate::xml::Element;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat, Utc};

/// Spell a timestamp according to the version's style
pub fn format_timestamp(ts: &DateTime<Utc>, style: TimestampStyle) -> String {
    match style {
        TimestampStyle::EpochMillis => ts.timestamp_millis().to_string(),
        TimestampStyle::Rfc3339 => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Parse a timestamp spelled in the version's style
pub fn parse_timestamp(s: &str, style: TimestampStyle) -> Result<DateTime<Utc>> {
    let s = s.trim();
    match style {
        TimestampStyle::EpochMillis => {
            let millis: i64 = s
                .parse()
                .map_err(|_| Error::Manifest(format!("invalid epoch timestamp: '{}'", s)))?;
            DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| Error::Manifest(format!("timestamp out of range: {}", millis)))
        }
        TimestampStyle::Rfc3339 => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::Manifest(format!("invalid timestamp '{}': {}", s, e))),
    }
}

/// Characters that XML 1.0 cannot carry in text
fn needs_encoding(value: &str) -> bool {
    value
        .chars()
        .any(|c| (c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{FFFE}' || c == '\u{FFFF}')
}

fn text_element(name: &str, text: impl Into<String>) -> Element {
    let text = text.into();
    if text.is_empty() {
        Element::new(name)
    } else {
        Element::new(name).with_text(text)
    }
}

fn push_text(parent: &mut Element, name: &str, text: impl Into<String>) {
    parent.children.push(crate::xml::Node::Element(text_element(name, text)));
}

fn parse_number<T: std::str::FromStr>(element: &Element, name: &str, default: T) -> Result<T> {
    match element.child_text(name) {
        Some(s) => s
            .parse()
            .map_err(|_| Error::Manifest(format!("invalid <{}> value: '{}'", name, s))),
        None => Ok(default),
    }
}

/// Serialize one record as a `<file>` element
pub fn record_to_element(record: &ResourceRecord, rules: &VersionRules) -> Result<Element> {
    let mut file = Element::new("file");
    if let Some(source) = &record.source {
        push_text(&mut file, "source", source.clone());
    }
    push_text(&mut file, "destination", record.destination.clone());
    push_text(&mut file, "type", record.type_name.clone());
    if let Some(size) = record.size {
        push_text(&mut file, "size", size.to_string());
    }
    push_text(&mut file, "flags", record.flags.to_string());
    push_text(&mut file, "owner", record.owner.clone());
    push_text(&mut file, "group", record.group.clone());
    if let Some(ts) = &record.created {
        push_text(&mut file, "datecreated", format_timestamp(ts, rules.timestamps));
    }
    push_text(&mut file, "usercreated", record.created_by.clone());
    if let Some(ts) = &record.modified {
        push_text(&mut file, "datelastmodified", format_timestamp(ts, rules.timestamps));
    }
    push_text(&mut file, "userlastmodified", record.modified_by.clone());

    if !record.properties.is_empty() {
        let mut properties = Element::new("properties");
        for property in &record.properties {
            let mut element = Element::new("property");
            let value = if needs_encoding(&property.value) {
                if !rules.base64_properties {
                    return Err(Error::Conversion(format!(
                        "property '{}' of {} needs encoding, which this format cannot express",
                        property.name, record.destination
                    )));
                }
                element = element.with_attr("encoding", "base64");
                BASE64.encode(property.value.as_bytes())
            } else {
                property.value.clone()
            };
            push_text(&mut element, "name", property.name.clone());
            push_text(&mut element, "value", value);
            properties = properties.with_child(element);
        }
        file = file.with_child(properties);
    }

    if rules.aces != AceStyle::None && !record.aces.is_empty() {
        let mut control = Element::new("accesscontrol");
        for ace in &record.aces {
            let mut entry = Element::new("accessentry").with_child(
                text_element("principal", ace.principal.name.clone())
                    .with_attr("type", ace.principal.kind.as_str()),
            );
            match rules.aces {
                AceStyle::PermissionString => {
                    push_text(&mut entry, "permissionset", format_permission_string(ace.allowed, ace.denied));
                }
                AceStyle::Bitmask => {
                    push_text(&mut entry, "allowed", ace.allowed.to_string());
                    push_text(&mut entry, "denied", ace.denied.to_string());
                }
                AceStyle::None => {}
            }
            push_text(&mut entry, "flags", ace.flags.to_string());
            control = control.with_child(entry);
        }
        file = file.with_child(control);
    }

    Ok(file)
}

/// Parse one `<file>` element
pub fn record_from_element(file: &Element, rules: &VersionRules) -> Result<ResourceRecord> {
    let destination = file
        .child_text("destination")
        .ok_or_else(|| Error::Manifest("record without <destination>".to_string()))?;
    let type_name = file
        .child_text("type")
        .ok_or_else(|| Error::Manifest(format!("record {} without <type>", destination)))?;

    let size = match file.child_text("size") {
        Some(s) => {
            let n: i64 = s
                .parse()
                .map_err(|_| Error::Manifest(format!("invalid <size> value: '{}'", s)))?;
            u64::try_from(n).ok()
        }
        None => None,
    };

    let timestamp = |name: &str| -> Result<Option<DateTime<Utc>>> {
        file.child_text(name)
            .map(|s| parse_timestamp(&s, rules.timestamps))
            .transpose()
    };

    let mut record = ResourceRecord {
        source: file.child_text("source"),
        flags: parse_number(file, "flags", 0u32)?,
        owner: file.child_text("owner").unwrap_or_default(),
        group: file.child_text("group").unwrap_or_default(),
        created: timestamp("datecreated")?,
        created_by: file.child_text("usercreated").unwrap_or_default(),
        modified: timestamp("datelastmodified")?,
        modified_by: file.child_text("userlastmodified").unwrap_or_default(),
        size,
        destination,
        type_name,
        properties: Vec::new(),
        aces: Vec::new(),
    };

    if let Some(properties) = file.child("properties") {
        for element in properties.children_named("property") {
            record.properties.push(property_from_element(element, rules)?);
        }
    }

    if rules.aces != AceStyle::None
        && let Some(control) = file.child("accesscontrol")
    {
        for entry in control.children_named("accessentry") {
            record.aces.push(ace_from_element(entry, rules)?);
        }
    }

    Ok(record)
}

fn property_from_element(element: &Element, rules: &VersionRules) -> Result<Property> {
    let name = element
        .child_text("name")
        .ok_or_else(|| Error::Manifest("property without <name>".to_string()))?;
    // Values are taken verbatim: surrounding whitespace is significant
    let raw = element.child("value").map(Element::text).unwrap_or_default();

    let value = match element.attr("encoding") {
        None => raw,
        Some(enc) if rules.base64_properties && enc.eq_ignore_ascii_case("base64") => {
            let bytes = BASE64
                .decode(raw.trim())
                .map_err(|e| Error::Conversion(format!("property '{}': {}", name, e)))?;
            String::from_utf8(bytes)
                .map_err(|e| Error::Conversion(format!("property '{}': {}", name, e)))?
        }
        Some(enc) => {
            return Err(Error::Conversion(format!(
                "property '{}' uses unsupported encoding '{}'",
                name, enc
            )));
        }
    };

    Ok(Property { name, value })
}

fn ace_from_element(entry: &Element, rules: &VersionRules) -> Result<AccessEntry> {
    let principal = entry
        .child("principal")
        .ok_or_else(|| Error::Manifest("access entry without <principal>".to_string()))?;
    let kind = match principal.attr("type") {
        Some(t) => PrincipalKind::parse(t)
            .ok_or_else(|| Error::Manifest(format!("unknown principal type '{}'", t)))?,
        None => PrincipalKind::User,
    };
    let name = principal.text().trim().to_string();
    if name.is_empty() {
        return Err(Error::Manifest("access entry with empty principal".to_string()));
    }

    let (allowed, denied) = match rules.aces {
        AceStyle::PermissionString => {
            parse_permission_string(&entry.child_text("permissionset").unwrap_or_default())?
        }
        _ => (
            parse_number(entry, "allowed", 0u32)?,
            parse_number(entry, "denied", 0u32)?,
        ),
    };

    Ok(AccessEntry {
        principal: PrincipalRef { kind, name },
        allowed,
        denied,
        flags: parse_number(entry, "flags", 0u32)?,
    })
}

/// Serialize the accounts section
pub fn accounts_to_element(accounts: &Accounts) -> Element {
    let mut users = Element::new("users");
    for user in &accounts.users {
        let mut element = Element::new("user");
        push_text(&mut element, "name", user.name.clone());
        if let Some(full) = &user.full_name {
            push_text(&mut element, "fullname", full.clone());
        }
        if !user.groups.is_empty() {
            let mut groups = Element::new("groups");
            for g in &user.groups {
                push_text(&mut groups, "groupref", g.clone());
            }
            element = element.with_child(groups);
        }
        users = users.with_child(element);
    }

    let mut groups = Element::new("groups");
    for group in &accounts.groups {
        let mut element = Element::new("group");
        push_text(&mut element, "name", group.name.clone());
        if let Some(desc) = &group.description {
            push_text(&mut element, "description", desc.clone());
        }
        groups = groups.with_child(element);
    }

    Element::new("accounts").with_child(users).with_child(groups)
}

/// Parse the accounts section
pub fn accounts_from_element(element: &Element) -> Result<Accounts> {
    let mut accounts = Accounts::default();
    if let Some(users) = element.child("users") {
        for user in users.children_named("user") {
            let name = user
                .child_text("name")
                .ok_or_else(|| Error::Manifest("user without <name>".to_string()))?;
            let groups = user
                .child("groups")
                .map(|g| g.children_named("groupref").map(|r| r.text().trim().to_string()).collect())
                .unwrap_or_default();
            accounts.users.push(UserRecord {
                name,
                full_name: user.child_text("fullname"),
                groups,
            });
        }
    }
    if let Some(groups) = element.child("groups") {
        for group in groups.children_named("group") {
            let name = group
                .child_text("name")
                .ok_or_else(|| Error::Manifest("group without <name>".to_string()))?;
            accounts.groups.push(GroupRecord {
                name,
                description: group.child_text("description"),
            });
        }
    }
    Ok(accounts)
}

/// Serialize the module section
pub fn module_to_element(module: &ModuleSection) -> Element {
    let mut groupings = Element::new("groupings");
    for grouping in &module.groupings {
        let mut element = Element::new("grouping").with_attr("name", grouping.name.clone());
        for fp in &grouping.fingerprints {
            element = element.with_child(Element::new("datasetref").with_attr("fingerprint", fp.clone()));
        }
        groupings = groupings.with_child(element);
    }

    let mut datasets = Element::new("datasets");
    for dataset in &module.datasets {
        datasets = datasets.with_child(
            Element::new("dataset")
                .with_attr("fingerprint", dataset.fingerprint.clone())
                .with_attr("class", dataset.class.clone())
                .with_attr("id", dataset.id.clone())
                .with_attr("source", dataset.source.clone()),
        );
    }

    Element::new("module")
        .with_attr("name", module.name.clone())
        .with_attr("version", module.version.clone())
        .with_child(groupings)
        .with_child(datasets)
}

/// Parse the module section
pub fn module_from_element(element: &Element) -> Result<ModuleSection> {
    let required = |e: &Element, attr: &str| -> Result<String> {
        e.attr(attr)
            .map(str::to_string)
            .ok_or_else(|| Error::Manifest(format!("<{}> without '{}' attribute", e.name, attr)))
    };

    let mut module = ModuleSection {
        name: required(element, "name")?,
        version: element.attr("version").unwrap_or_default().to_string(),
        ..Default::default()
    };

    if let Some(groupings) = element.child("groupings") {
        for grouping in groupings.children_named("grouping") {
            let fingerprints = grouping
                .children_named("datasetref")
                .map(|r| required(r, "fingerprint"))
                .collect::<Result<Vec<_>>>()?;
            module.groupings.push(GroupingRef {
                name: required(grouping, "name")?,
                fingerprints,
            });
        }
    }

    if let Some(datasets) = element.child("datasets") {
        for dataset in datasets.children_named("dataset") {
            module.datasets.push(DatasetRef {
                fingerprint: required(dataset, "fingerprint")?,
                class: required(dataset, "class")?,
                id: required(dataset, "id")?,
                source: required(dataset, "source")?,
            });
        }
    }

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::permissions::{PERMISSION_READ, PERMISSION_VIEW, PERMISSION_WRITE};
    use crate::manifest::FormatVersion;
    use chrono::TimeZone;

    fn sample_record() -> ResourceRecord {
        ResourceRecord {
            destination: "sites/default/a.txt".to_string(),
            type_name: "plain".to_string(),
            flags: 4,
            owner: "alice".to_string(),
            group: "staff".to_string(),
            created: Some(Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()),
            created_by: "alice".to_string(),
            modified: Some(Utc.with_ymd_and_hms(2021, 6, 7, 8, 9, 10).unwrap()),
            modified_by: "bob".to_string(),
            size: Some(5),
            source: Some("content/sites/default/a.txt".to_string()),
            properties: vec![
                Property::new("title", "  Hello  "),
                Property::new("ctl", "a\u{1}b"),
            ],
            aces: vec![AccessEntry {
                principal: PrincipalRef::group("staff"),
                allowed: PERMISSION_READ | PERMISSION_WRITE,
                denied: PERMISSION_VIEW,
                flags: 0,
            }],
        }
    }

    #[test]
    fn test_timestamp_styles() {
        let ts = Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 7).unwrap();
        let millis = format_timestamp(&ts, TimestampStyle::EpochMillis);
        assert_eq!(millis, "1646370367000");
        assert_eq!(parse_timestamp(&millis, TimestampStyle::EpochMillis).unwrap(), ts);

        let text = format_timestamp(&ts, TimestampStyle::Rfc3339);
        assert_eq!(text, "2022-03-04T05:06:07.000Z");
        assert_eq!(parse_timestamp(&text, TimestampStyle::Rfc3339).unwrap(), ts);
        assert!(parse_timestamp("yesterday", TimestampStyle::Rfc3339).is_err());
    }

    #[test]
    fn test_record_v3_uses_base64_for_control_chars() {
        let rules = FormatVersion::V3.rules();
        let element = record_to_element(&sample_record(), &rules).unwrap();
        let props = element.child("properties").unwrap();
        let encoded: Vec<_> = props.children_named("property").map(|p| p.attr("encoding")).collect();
        assert_eq!(encoded, vec![None, Some("base64")]);

        let parsed = record_from_element(&element, &rules).unwrap();
        assert_eq!(parsed, sample_record());
    }

    #[test]
    fn test_record_v1_permission_string() {
        let rules = FormatVersion::V1.rules();
        let mut record = sample_record();
        record.properties.truncate(1);
        let element = record_to_element(&record, &rules).unwrap();
        let entry = element.child("accesscontrol").unwrap().child("accessentry").unwrap();
        assert_eq!(entry.child_text("permissionset").as_deref(), Some("+r+w-v"));
        assert!(entry.child("allowed").is_none());
        assert_eq!(element.child_text("datecreated").as_deref(), Some("1577934245000"));

        assert_eq!(record_from_element(&element, &rules).unwrap(), record);
    }

    #[test]
    fn test_record_v1_cannot_carry_control_chars() {
        let result = record_to_element(&sample_record(), &FormatVersion::V1.rules());
        assert!(matches!(result, Err(Error::Conversion(_))));
    }

    #[test]
    fn test_record_v0_ignores_aces() {
        let rules = FormatVersion::V0.rules();
        let mut record = sample_record();
        record.properties.clear();
        let element = record_to_element(&record, &rules).unwrap();
        assert!(element.child("accesscontrol").is_none());
        assert!(record_from_element(&element, &rules).unwrap().aces.is_empty());
    }

    #[test]
    fn test_folder_record_and_negative_size() {
        let rules = FormatVersion::V2.rules();
        let element = Element::new("file")
            .with_child(Element::new("destination").with_text("sites"))
            .with_child(Element::new("type").with_text("folder"))
            .with_child(Element::new("size").with_text("-1"));
        let record = record_from_element(&element, &rules).unwrap();
        assert_eq!(record.source, None);
        assert_eq!(record.size, None);
        assert_eq!(record.flags, 0);
    }

    #[test]
    fn test_record_requires_destination() {
        let element = Element::new("file").with_child(Element::new("type").with_text("plain"));
        assert!(record_from_element(&element, &FormatVersion::V3.rules()).is_err());
    }

    #[test]
    fn test_accounts_round_trip() {
        let accounts = Accounts {
            users: vec![UserRecord {
                name: "alice".to_string(),
                full_name: Some("Alice A.".to_string()),
                groups: vec!["staff".to_string()],
            }],
            groups: vec![GroupRecord { name: "staff".to_string(), description: None }],
        };
        assert_eq!(accounts_from_element(&accounts_to_element(&accounts)).unwrap(), accounts);
    }

    #[test]
    fn test_module_round_trip() {
        let module = ModuleSection {
            name: "blog".to_string(),
            version: "1.2".to_string(),
            groupings: vec![GroupingRef {
                name: "front".to_string(),
                fingerprints: vec!["ab".to_string(), "cd".to_string()],
            }],
            datasets: vec![DatasetRef {
                fingerprint: "ab".to_string(),
                class: "article".to_string(),
                id: "1".to_string(),
                source: "datasets/ab.json".to_string(),
            }],
        };
        assert_eq!(module_from_element(&module_to_element(&module)).unwrap(), module);
    }
}
