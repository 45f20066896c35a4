//! OpenNebula XML-RPC client
//!
//! Every call takes the `user:password` session string as first argument
//! and answers with an array `[success, body, error_code]`, where `body` is
//! either an XML document (pool reads), a numeric id (allocations) or an
//! error message.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use quick_xml::Reader;
use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::Event;
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};

use super::repository::{OneRepository, PoolElement, PoolKind};
use super::TargetRecord;
use crate::error::{AllocateError, RepositoryError, RepositoryResult};

/// Default XML-RPC endpoint of a local frontend
pub const DEFAULT_ENDPOINT: &str = "http://localhost:2633/RPC2";

/// Scalar XML-RPC argument
#[derive(Debug, Clone, Copy)]
enum Param<'a> {
    Str(&'a str),
    Int(i64),
    Bool(bool),
}

/// Blocking XML-RPC client
pub struct OneClient {
    http: Client,
    endpoint: String,
    session: SecretString,
}

impl std::fmt::Debug for OneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneClient")
            .field("endpoint", &self.endpoint)
            .field("session", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl OneClient {
    /// Creates a client for `endpoint` authenticated with `session`
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Transport` if the HTTP client cannot be built.
    pub fn new(endpoint: &str, session: SecretString) -> RepositoryResult<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            session,
        })
    }

    /// Endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn call(&self, method: &str, params: &[Param<'_>]) -> RepositoryResult<String> {
        let body = build_request(method, self.session.expose_secret(), params);
        tracing::trace!(method, endpoint = %self.endpoint, "XML-RPC call");

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RepositoryError::Transport(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error")
            )));
        }
        let text = response
            .text()
            .map_err(|e| RepositoryError::Transport(e.to_string()))?;

        let values = parse_method_response(&text)?;
        match values.first().map(String::as_str) {
            Some("1" | "true") => Ok(values.get(1).cloned().unwrap_or_default()),
            Some(_) => Err(RepositoryError::Remote(
                values.get(1).cloned().unwrap_or_default(),
            )),
            None => Err(RepositoryError::Parse(format!(
                "{method} returned an empty response"
            ))),
        }
    }

    fn allocated_id(method: &str, body: &str) -> Result<i64, AllocateError> {
        body.trim().parse().map_err(|_| {
            AllocateError::Transport(format!("{method} returned a non-numeric id: {body}"))
        })
    }
}

fn allocate_error(err: RepositoryError) -> AllocateError {
    match err {
        RepositoryError::Remote(message) => AllocateError::Rejected(message),
        other => AllocateError::Transport(other.to_string()),
    }
}

impl OneRepository for OneClient {
    fn pool(&self, kind: PoolKind) -> RepositoryResult<Vec<PoolElement>> {
        let method = format!("one.{}pool.info", kind.method_prefix());
        let xml = match kind {
            PoolKind::Host | PoolKind::Datastore => self.call(&method, &[])?,
            // all resources, full id range
            _ => self.call(&method, &[Param::Int(-2), Param::Int(-1), Param::Int(-1)])?,
        };
        parse_pool(&xml, kind)
    }

    fn host(&self, id: i64) -> RepositoryResult<PoolElement> {
        let xml = self.call("one.host.info", &[Param::Int(id)]).map_err(|e| match e {
            RepositoryError::Remote(_) => RepositoryError::NotFound {
                kind: PoolKind::Host.label(),
                key: id.to_string(),
            },
            other => other,
        })?;
        parse_pool(&xml, PoolKind::Host)?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound {
                kind: PoolKind::Host.label(),
                key: id.to_string(),
            })
    }

    fn system_config(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let xml = self.call("one.system.config", &[])?;
        parse_flat_document(&xml)
    }

    fn allocate(
        &self,
        kind: PoolKind,
        record: &TargetRecord,
        placement: Option<i64>,
    ) -> Result<i64, AllocateError> {
        let template = record.render();
        let cluster = placement.unwrap_or(-1);

        match kind {
            PoolKind::Host => {
                let name = record.get("NAME").unwrap_or_default();
                let im_mad = record.get("IM_MAD").unwrap_or("vcenter");
                let vmm_mad = record.get("VMM_MAD").unwrap_or("vcenter");
                let body = self
                    .call(
                        "one.host.allocate",
                        &[
                            Param::Str(name),
                            Param::Str(im_mad),
                            Param::Str(vmm_mad),
                            Param::Int(cluster),
                        ],
                    )
                    .map_err(allocate_error)?;
                let id = Self::allocated_id("one.host.allocate", &body)?;
                // merge the full record into the new host template
                self.call(
                    "one.host.update",
                    &[Param::Int(id), Param::Str(&template), Param::Int(1)],
                )
                .map_err(allocate_error)?;
                Ok(id)
            }
            PoolKind::Image => {
                let datastore = placement.ok_or_else(|| {
                    AllocateError::Rejected("an image needs a target datastore".to_string())
                })?;
                let body = self
                    .call(
                        "one.image.allocate",
                        &[Param::Str(&template), Param::Int(datastore), Param::Bool(false)],
                    )
                    .map_err(allocate_error)?;
                Self::allocated_id("one.image.allocate", &body)
            }
            PoolKind::Template => {
                let body = self
                    .call("one.template.allocate", &[Param::Str(&template)])
                    .map_err(allocate_error)?;
                Self::allocated_id("one.template.allocate", &body)
            }
            PoolKind::Datastore | PoolKind::VirtualNetwork => {
                let method = format!("one.{}.allocate", kind.method_prefix());
                let body = self
                    .call(&method, &[Param::Str(&template), Param::Int(cluster)])
                    .map_err(allocate_error)?;
                Self::allocated_id(&method, &body)
            }
        }
    }
}

fn build_request(method: &str, session: &str, params: &[Param<'_>]) -> String {
    let mut out = String::from("<?xml version=\"1.0\"?><methodCall><methodName>");
    out.push_str(method);
    out.push_str("</methodName><params>");
    for param in std::iter::once(Param::Str(session)).chain(params.iter().copied()) {
        out.push_str("<param><value>");
        match param {
            Param::Str(s) => {
                let _ = write!(out, "<string>{}</string>", escape(s));
            }
            Param::Int(i) => {
                let _ = write!(out, "<i4>{i}</i4>");
            }
            Param::Bool(b) => {
                let _ = write!(out, "<boolean>{}</boolean>", u8::from(b));
            }
        }
        out.push_str("</value></param>");
    }
    out.push_str("</params></methodCall>");
    out
}

/// Accumulates text content across text, CDATA and entity events
fn append_text(buf: &mut String, event: &Event<'_>) {
    match event {
        Event::Text(e) => buf.push_str(&String::from_utf8_lossy(e)),
        Event::CData(e) => buf.push_str(&String::from_utf8_lossy(e)),
        Event::GeneralRef(e) => {
            if let Ok(Some(c)) = e.resolve_char_ref() {
                buf.push(c);
            } else if let Some(s) = resolve_predefined_entity(&String::from_utf8_lossy(e)) {
                buf.push_str(s);
            }
        }
        _ => {}
    }
}

/// Extracts the values of the response array (or the fault string)
fn parse_method_response(xml: &str) -> RepositoryResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);

    let mut depth: Vec<String> = Vec::new();
    let mut text_buf = String::new();
    let mut scalar: Option<String> = None;
    let mut values = Vec::new();
    let mut in_fault = false;
    let mut last_member = String::new();
    let mut fault_string: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RepositoryError::Parse(e.to_string()))?;
        match event {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "fault" {
                    in_fault = true;
                }
                depth.push(tag);
                text_buf.clear();
            }
            Event::Text(_) | Event::CData(_) | Event::GeneralRef(_) => {
                append_text(&mut text_buf, &event);
            }
            Event::End(_) => {
                let Some(tag) = depth.pop() else { continue };
                let parent = depth.last().map(String::as_str);
                match tag.as_str() {
                    "name" if in_fault => last_member = text_buf.trim().to_string(),
                    "string" | "boolean" | "i4" | "i8" | "int" | "double" => {
                        if in_fault && last_member == "faultString" {
                            fault_string = Some(text_buf.clone());
                        }
                        scalar = Some(std::mem::take(&mut text_buf));
                    }
                    "value" if parent == Some("data") => {
                        values.push(scalar.take().unwrap_or_else(|| text_buf.clone()));
                    }
                    _ => {}
                }
                text_buf.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if in_fault {
        return Err(RepositoryError::Remote(
            fault_string.unwrap_or_else(|| "XML-RPC fault".to_string()),
        ));
    }
    Ok(values)
}

/// Parses a pool document (or a single element document) into elements
pub(crate) fn parse_pool(xml: &str, kind: PoolKind) -> RepositoryResult<Vec<PoolElement>> {
    let element_tag = kind.element_tag();
    let mut reader = Reader::from_str(xml);

    let mut depth: Vec<String> = Vec::new();
    let mut text_buf = String::new();
    let mut current: Option<(usize, PoolElement)> = None;
    let mut elements = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RepositoryError::Parse(format!("{kind} pool: {e}")))?;
        match event {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == element_tag && current.is_none() {
                    current = Some((depth.len(), PoolElement::default()));
                }
                depth.push(tag);
                text_buf.clear();
            }
            Event::Text(_) | Event::CData(_) | Event::GeneralRef(_) => {
                append_text(&mut text_buf, &event);
            }
            Event::End(_) => {
                let Some(tag) = depth.pop() else { continue };
                let Some((start, element)) = current.as_mut() else {
                    text_buf.clear();
                    continue;
                };
                let level = depth.len();
                let value = text_buf.trim();

                if level == *start {
                    if let Some((_, done)) = current.take() {
                        elements.push(done);
                    }
                } else if level == *start + 1 {
                    match tag.as_str() {
                        "ID" => {
                            element.id = value.parse().map_err(|_| {
                                RepositoryError::Parse(format!("{kind} has a non-numeric ID {value:?}"))
                            })?;
                        }
                        "NAME" => element.name = value.to_string(),
                        _ => {}
                    }
                } else if level == *start + 2 && depth.last().is_some_and(|p| p == "TEMPLATE") {
                    element.template.insert(tag, value.to_string());
                }
                text_buf.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(elements)
}

/// Parses a document whose root children are plain key/value leaves
pub(crate) fn parse_flat_document(xml: &str) -> RepositoryResult<BTreeMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut depth: Vec<String> = Vec::new();
    let mut text_buf = String::new();
    let mut values = BTreeMap::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| RepositoryError::Parse(format!("system config: {e}")))?;
        match event {
            Event::Start(ref e) => {
                depth.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                text_buf.clear();
            }
            Event::Text(_) | Event::CData(_) | Event::GeneralRef(_) => {
                append_text(&mut text_buf, &event);
            }
            Event::End(_) => {
                if let Some(tag) = depth.pop()
                    && depth.len() == 1
                {
                    values
                        .entry(tag)
                        .or_insert_with(|| text_buf.trim().to_string());
                }
                text_buf.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST_POOL: &str = r#"<HOST_POOL>
  <HOST>
    <ID>3</ID>
    <NAME>Cluster1</NAME>
    <TEMPLATE>
      <VCENTER_HOST><![CDATA[vc.example.com]]></VCENTER_HOST>
      <VCENTER_USER><![CDATA[admin@vsphere.local]]></VCENTER_USER>
      <VCENTER_CCR_REF><![CDATA[domain-c7]]></VCENTER_CCR_REF>
    </TEMPLATE>
  </HOST>
  <HOST>
    <ID>4</ID>
    <NAME>kvm &amp; friends</NAME>
    <TEMPLATE/>
  </HOST>
</HOST_POOL>"#;

    #[test]
    fn parses_host_pool() {
        let hosts = parse_pool(HOST_POOL, PoolKind::Host).unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].id, 3);
        assert_eq!(hosts[0].name, "Cluster1");
        assert_eq!(hosts[0].attr("VCENTER_HOST"), Some("vc.example.com"));
        assert_eq!(hosts[0].attr("VCENTER_CCR_REF"), Some("domain-c7"));
        assert_eq!(hosts[1].name, "kvm & friends");
        assert!(hosts[1].template.is_empty());
    }

    #[test]
    fn nested_vectors_are_not_template_scalars() {
        let xml = "<VMTEMPLATE_POOL><VMTEMPLATE><ID>9</ID><NAME>t</NAME><TEMPLATE>\
                   <DISK><IMAGE_ID>1</IMAGE_ID></DISK><VCENTER_TEMPLATE_REF>vm-1</VCENTER_TEMPLATE_REF>\
                   </TEMPLATE></VMTEMPLATE></VMTEMPLATE_POOL>";
        let templates = parse_pool(xml, PoolKind::Template).unwrap();
        assert_eq!(templates[0].attr("VCENTER_TEMPLATE_REF"), Some("vm-1"));
        assert_eq!(templates[0].attr("IMAGE_ID"), None);
    }

    #[test]
    fn single_element_document_parses() {
        let xml = "<HOST><ID>0</ID><NAME>h</NAME><TEMPLATE><VCENTER_PASSWORD>x==</VCENTER_PASSWORD></TEMPLATE></HOST>";
        let host = parse_pool(xml, PoolKind::Host).unwrap();
        assert_eq!(host[0].attr("VCENTER_PASSWORD"), Some("x=="));
    }

    #[test]
    fn parses_success_response() {
        let xml = "<?xml version=\"1.0\"?><methodResponse><params><param><value><array><data>\
                   <value><boolean>1</boolean></value>\
                   <value><string>&lt;HOST_POOL/&gt;</string></value>\
                   <value><i4>0</i4></value>\
                   </data></array></value></param></params></methodResponse>";
        let values = parse_method_response(xml).unwrap();
        assert_eq!(values, vec!["1", "<HOST_POOL/>", "0"]);
    }

    #[test]
    fn parses_fault_response() {
        let xml = "<methodResponse><fault><value><struct>\
                   <member><name>faultCode</name><value><int>4</int></value></member>\
                   <member><name>faultString</name><value><string>bad method</string></value></member>\
                   </struct></value></fault></methodResponse>";
        match parse_method_response(xml) {
            Err(RepositoryError::Remote(msg)) => assert_eq!(msg, "bad method"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn system_config_reads_one_key() {
        let xml = "<OPENNEBULA_CONFIGURATION><DB><BACKEND>sqlite</BACKEND></DB>\
                   <ONE_KEY>0123456789abcdef0123456789abcdef</ONE_KEY></OPENNEBULA_CONFIGURATION>";
        let config = parse_flat_document(xml).unwrap();
        assert_eq!(
            config.get("ONE_KEY").map(String::as_str),
            Some("0123456789abcdef0123456789abcdef")
        );
        assert!(!config.contains_key("BACKEND"));
    }

    #[test]
    fn request_escapes_strings() {
        let body = build_request("one.template.allocate", "oneadmin:pw", &[Param::Str("NAME=\"a<b\"")]);
        assert!(body.contains("<methodName>one.template.allocate</methodName>"));
        assert!(body.contains("<string>oneadmin:pw</string>"));
        assert!(body.contains("NAME=&quot;a&lt;b&quot;"));
    }
}
