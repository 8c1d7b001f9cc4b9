//! UCS Manager XML API codec.
//!
//! Builds the request documents posted to `/nuova` and pulls the few
//! attributes we need out of the responses:
//!
//! - `aaaLogin` / `aaaLogout`
//! - `configFindDnsByClassId` (every `computeItem` DN)
//! - `configResolveDn` (one rack unit or blade)
//! - `configResolveClass` (the `topSystem` name)
//!
//! An absent attribute comes back as `None`. A well-formed response without
//! the expected element is an empty result, not an error.

use std::collections::HashMap;
use std::fmt::Display;
use std::str;

use quick_xml::events::{BytesDecl, BytesPI, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

/// Class enumerated to find every blade and rack server.
pub const COMPUTE_ITEM_CLASS: &str = "computeItem";

/// Class carrying the domain name.
pub const TOP_SYSTEM_CLASS: &str = "topSystem";

/// Element types `configResolveDn` may answer with for a compute item.
pub const SERVER_ELEMENTS: [&str; 2] = ["computeRackUnit", "computeBlade"];

const STYLESHEET_PI: &str = r#"xml-stylesheet type="text/xsl" href="style.xsl""#;

// =============================================================================
// Request Builders
// =============================================================================

fn write_err<E: Display>(e: E) -> Error {
    Error::XmlWrite(e.to_string())
}

fn parse_err<E: Display>(e: E) -> Error {
    Error::XmlParse(e.to_string())
}

fn begin_document() -> Result<Writer<Vec<u8>>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_err)?;
    writer
        .write_event(Event::PI(BytesPI::new(STYLESHEET_PI)))
        .map_err(write_err)?;
    Ok(writer)
}

fn finish_document(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(write_err)
}

/// `<aaaLogin inName=".." inPassword=".."/>`
pub fn login_request(username: &str, password: &str) -> Result<String> {
    let mut writer = begin_document()?;
    writer
        .create_element("aaaLogin")
        .with_attribute(("inName", username))
        .with_attribute(("inPassword", password))
        .write_empty()
        .map_err(write_err)?;
    finish_document(writer)
}

/// `<aaaLogout inCookie=".."/>`
pub fn logout_request(cookie: &str) -> Result<String> {
    let mut writer = begin_document()?;
    writer
        .create_element("aaaLogout")
        .with_attribute(("inCookie", cookie))
        .write_empty()
        .map_err(write_err)?;
    finish_document(writer)
}

/// `<configFindDnsByClassId classId=".." cookie=".."/>`
pub fn find_dns_by_class_request(cookie: &str, class_id: &str) -> Result<String> {
    let mut writer = begin_document()?;
    writer
        .create_element("configFindDnsByClassId")
        .with_attribute(("classId", class_id))
        .with_attribute(("cookie", cookie))
        .write_empty()
        .map_err(write_err)?;
    finish_document(writer)
}

/// `<configResolveDn dn=".." cookie=".." inHierarchical="false"/>`
pub fn resolve_dn_request(cookie: &str, dn: &str) -> Result<String> {
    let mut writer = begin_document()?;
    writer
        .create_element("configResolveDn")
        .with_attribute(("dn", dn))
        .with_attribute(("cookie", cookie))
        .with_attribute(("inHierarchical", "false"))
        .write_empty()
        .map_err(write_err)?;
    finish_document(writer)
}

/// `<configResolveClass cookie=".." classId=".." inHierarchical="false"/>`
pub fn resolve_class_request(cookie: &str, class_id: &str) -> Result<String> {
    let mut writer = begin_document()?;
    writer
        .create_element("configResolveClass")
        .with_attribute(("cookie", cookie))
        .with_attribute(("classId", class_id))
        .with_attribute(("inHierarchical", "false"))
        .write_empty()
        .map_err(write_err)?;
    finish_document(writer)
}

// =============================================================================
// Response Types
// =============================================================================

/// Attributes of `aaaLogin` in the login response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginResponse {
    pub cookie: Option<String>,
    pub version: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

/// The canonical attributes of a `computeRackUnit` / `computeBlade`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerAttributes {
    /// Element type that answered
    pub class: String,
    pub name: Option<String>,
    pub model: Option<String>,
    pub part_number: Option<String>,
    pub serial: Option<String>,
    pub uuid: Option<String>,
    pub original_uuid: Option<String>,
    /// Raw `serverId`, `chassis/slot` for blades
    pub position: Option<String>,
    pub description: Option<String>,
}

/// `errorCode` / `errorDescr` on the root of a refused request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: HashMap<String, String>,
}

impl Element {
    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let name = str::from_utf8(e.name().as_ref())
            .map_err(|_| Error::XmlParse("Invalid UTF-8 in tag name".into()))?
            .to_string();

        let mut attrs = HashMap::new();
        for attr in e.attributes() {
            let attr = attr.map_err(parse_err)?;
            let key = str::from_utf8(attr.key.as_ref())
                .map_err(|_| Error::XmlParse("Invalid UTF-8 in attribute name".into()))?
                .to_string();
            let value = attr.unescape_value().map_err(parse_err)?.into_owned();
            attrs.insert(key, value);
        }

        Ok(Self { name, attrs })
    }

    fn take(&mut self, key: &str) -> Option<String> {
        self.attrs.remove(key)
    }
}

// =============================================================================
// Response Parsing
// =============================================================================

/// Walk every element, handing the visitor its ancestor path.
///
/// The visitor returns `false` to stop early.
fn walk<F>(xml: &str, mut visit: F) -> Result<()>
where
    F: FnMut(&[String], Element) -> bool,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut seen_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                seen_root = true;
                let element = Element::from_start(e)?;
                let name = element.name.clone();
                if !visit(&path, element) {
                    return Ok(());
                }
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                seen_root = true;
                if !visit(&path, Element::from_start(e)?) {
                    return Ok(());
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlParse(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    if !seen_root {
        return Err(Error::XmlParse("document has no root element".into()));
    }
    if let Some(open) = path.last() {
        return Err(Error::XmlParse(format!("unclosed element <{}>", open)));
    }
    Ok(())
}

fn parent_is(path: &[String], name: &str) -> bool {
    path.last().map(String::as_str) == Some(name)
}

/// Read cookie and version from an `aaaLogin` response.
pub fn parse_login_response(xml: &str) -> Result<LoginResponse> {
    let mut response = LoginResponse::default();

    walk(xml, |path, mut element| {
        if path.is_empty() && element.name == "aaaLogin" {
            response.cookie = element.take("outCookie").filter(|c| !c.is_empty());
            response.version = element.take("outVersion");
            response.error_code = element.take("errorCode");
            response.error_description = element.take("errorDescr");
        }
        false
    })?;

    Ok(response)
}

/// The error carried by the root element, if the request was refused.
///
/// UCS Manager answers an expired cookie or an unknown DN with HTTP 200 and
/// an `errorCode` attribute instead of an `out*` child.
pub fn parse_error_reply(xml: &str) -> Result<Option<ErrorReply>> {
    let mut reply = None;

    walk(xml, |path, mut element| {
        if path.is_empty() {
            if let Some(code) = element.take("errorCode").filter(|c| !c.is_empty()) {
                reply = Some(ErrorReply {
                    description: element.take("errorDescr").unwrap_or_default(),
                    code,
                });
            }
        }
        false
    })?;

    Ok(reply)
}

/// Collect `outDns/dn/@value` from a `configFindDnsByClassId` response.
pub fn parse_dn_list(xml: &str) -> Result<Vec<String>> {
    let mut dns = Vec::new();

    walk(xml, |path, mut element| {
        if element.name == "dn" && parent_is(path, "outDns") {
            if let Some(value) = element.take("value").filter(|v| !v.is_empty()) {
                dns.push(value);
            }
        }
        true
    })?;

    Ok(dns)
}

/// Pull the first rack unit or blade out of a `configResolveDn` response.
pub fn parse_server_detail(xml: &str) -> Result<Option<ServerAttributes>> {
    let mut found = None;

    walk(xml, |path, mut element| {
        if SERVER_ELEMENTS.contains(&element.name.as_str()) && parent_is(path, "outConfig") {
            found = Some(ServerAttributes {
                name: element.take("name"),
                model: element.take("model"),
                part_number: element.take("partNumber"),
                serial: element.take("serial"),
                uuid: element.take("uuid"),
                original_uuid: element.take("originalUuid"),
                position: element.take("serverId"),
                description: element.take("descr"),
                class: std::mem::take(&mut element.name),
            });
            return false;
        }
        true
    })?;

    Ok(found)
}

/// Read `outConfigs/topSystem/@name` from a `configResolveClass` response.
pub fn parse_system_name(xml: &str) -> Result<Option<String>> {
    let mut name = None;

    walk(xml, |path, mut element| {
        if element.name == TOP_SYSTEM_CLASS && parent_is(path, "outConfigs") {
            name = element.take("name");
            return false;
        }
        true
    })?;

    Ok(name)
}
