//! Policy text parser.
//!
//! The format is line oriented:
//!
//! ```text
//! # comment
//! alias: net_access net.http,net.https,net.socket
//!
//! domain: operator
//! allow: net_access
//! blanket(session): push.register
//!
//! domain: untrusted
//! session(oneshot): net_access
//! oneshot(deny): messaging.send
//! ```
//!
//! - `alias: <name> <list>` defines a named group of capabilities.
//! - `domain: <name>` opens a section.
//! - `allow: <list>` sets ceiling and default to `allow`.
//! - `<level>[(<default>)]: <list>` with level in `blanket`, `session`,
//!   `oneshot` and default in those plus `deny`. The default may not exceed
//!   the level; when absent it equals the level.
//!
//! A list is comma separated; each item is a capability name or an alias.
//! Any malformed line fails the whole parse.

use std::collections::HashMap;

use crate::capability::Capability;
use crate::error::{CapabilityError, CapabilityResult};
use crate::level::PermissionLevel;
use crate::policy::{DomainPermissions, PolicyTable};

fn parse_error(line: usize, message: impl Into<String>) -> CapabilityError {
    CapabilityError::PolicyParse {
        line,
        message: message.into(),
    }
}

/// Parser state carried across lines.
#[derive(Default)]
struct Parser {
    aliases: HashMap<String, Vec<Capability>>,
    table: PolicyTable,
    current: Option<DomainPermissions>,
}

impl Parser {
    fn finish_domain(&mut self) {
        if let Some(domain) = self.current.take() {
            self.table.insert(domain);
        }
    }

    fn line(&mut self, number: usize, raw: &str) -> CapabilityResult<()> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        let (keyword, rest) = line
            .split_once(':')
            .ok_or_else(|| parse_error(number, format!("expected `<directive>: ...`, got `{line}`")))?;
        let keyword = keyword.trim();
        let rest = rest.trim();

        match keyword.to_ascii_lowercase().as_str() {
            "alias" => self.alias(number, rest),
            "domain" => self.domain(number, rest),
            _ => self.levels(number, keyword, rest),
        }
    }

    fn alias(&mut self, number: usize, rest: &str) -> CapabilityResult<()> {
        let (name, list) = rest
            .split_once(char::is_whitespace)
            .ok_or_else(|| parse_error(number, "alias needs a name and a capability list"))?;
        if self.aliases.contains_key(name) {
            return Err(parse_error(number, format!("alias `{name}` defined twice")));
        }
        if name.parse::<Capability>().is_ok() {
            return Err(parse_error(
                number,
                format!("alias `{name}` shadows a capability name"),
            ));
        }

        let mut members = Vec::new();
        for item in split_list(number, list)? {
            let cap = item
                .parse::<Capability>()
                .map_err(|_| parse_error(number, format!("unknown capability `{item}` in alias")))?;
            members.push(cap);
        }
        self.aliases.insert(name.to_string(), members);
        Ok(())
    }

    fn domain(&mut self, number: usize, name: &str) -> CapabilityResult<()> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(parse_error(number, format!("invalid domain name `{name}`")));
        }
        self.finish_domain();
        if self.table.contains(name) {
            return Err(parse_error(number, format!("domain `{name}` defined twice")));
        }
        self.current = Some(DomainPermissions::empty(name));
        Ok(())
    }

    fn levels(&mut self, number: usize, keyword: &str, list: &str) -> CapabilityResult<()> {
        let (maximum, default) = parse_level_spec(number, keyword)?;
        let caps = self.expand(number, list)?;
        let domain = self.current.as_mut().ok_or_else(|| {
            parse_error(number, format!("`{keyword}` directive outside of a domain section"))
        })?;
        for cap in caps {
            domain.set(cap, maximum, default);
        }
        Ok(())
    }

    fn expand(&self, number: usize, list: &str) -> CapabilityResult<Vec<Capability>> {
        let mut caps = Vec::new();
        for item in split_list(number, list)? {
            if let Some(members) = self.aliases.get(item) {
                caps.extend_from_slice(members);
            } else {
                let cap = item
                    .parse::<Capability>()
                    .map_err(|_| parse_error(number, format!("unknown capability or alias `{item}`")))?;
                caps.push(cap);
            }
        }
        Ok(caps)
    }
}

/// Split a comma separated list, rejecting empty items.
fn split_list(number: usize, list: &str) -> CapabilityResult<Vec<&str>> {
    let items: Vec<&str> = list.split(',').map(str::trim).collect();
    if items.iter().any(|item| item.is_empty()) {
        return Err(parse_error(number, "empty item in capability list"));
    }
    Ok(items)
}

/// Parse `allow`, `session`, or `blanket(oneshot)` into (ceiling, default).
fn parse_level_spec(
    number: usize,
    spec: &str,
) -> CapabilityResult<(PermissionLevel, PermissionLevel)> {
    let (level_kw, default_kw) = match spec.split_once('(') {
        Some((level, tail)) => {
            let default = tail
                .strip_suffix(')')
                .ok_or_else(|| parse_error(number, format!("unterminated default in `{spec}`")))?;
            (level.trim(), Some(default.trim()))
        },
        None => (spec, None),
    };

    let maximum = PermissionLevel::from_policy_ceiling(level_kw)
        .ok_or_else(|| parse_error(number, format!("unknown directive `{level_kw}`")))?;

    let default = match default_kw {
        None => maximum,
        Some(_) if maximum == PermissionLevel::Allow => {
            return Err(parse_error(number, "`allow` takes no default level"));
        },
        Some(kw) => {
            let default = PermissionLevel::from_policy_default(kw)
                .ok_or_else(|| parse_error(number, format!("unknown default level `{kw}`")))?;
            if default != PermissionLevel::Deny && !maximum.permits(default) {
                return Err(parse_error(
                    number,
                    format!("default `{kw}` exceeds level `{level_kw}`"),
                ));
            }
            default
        },
    };

    Ok((maximum, default))
}

/// Parse a complete policy text.
///
/// # Errors
///
/// Returns [`CapabilityError::PolicyParse`] on the first malformed line. No
/// partial table is ever returned.
pub fn parse(text: &str) -> CapabilityResult<PolicyTable> {
    let mut parser = Parser::default();
    for (idx, raw) in text.lines().enumerate() {
        parser.line(idx.saturating_add(1), raw)?;
    }
    parser.finish_domain();
    Ok(parser.table)
}
