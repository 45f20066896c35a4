//! Blocking vSphere JSON API client

use std::fs::File;
use std::path::Path;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use super::{DatastoreFile, ManagedObjectRef, ServiceContent, VimError, VimResult, VimSession};
use crate::error::{ConnectionError, ConnectionResult};

/// Header carrying the session token on every JSON API request
const SESSION_HEADER: &str = "vmware-api-session-id";

/// Cookie the datastore file service accepts as session proof
const SESSION_COOKIE: &str = "vmware_soap_session";

/// Parameters of a JSON API login
#[derive(Debug, Clone, Copy)]
pub struct LoginParams<'a> {
    /// Endpoint host name or address
    pub host: &'a str,
    /// User name
    pub user: &'a str,
    /// Plain password
    pub password: &'a SecretString,
    /// API release segment of the URL, e.g. `8.0.1.0`
    pub release: &'a str,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
}

/// Live session against a vCenter JSON API endpoint
pub struct JsonApiSession {
    http: Client,
    host: String,
    base: String,
    session_id: SecretString,
    content: ServiceContent,
}

impl std::fmt::Debug for JsonApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonApiSession")
            .field("host", &self.host)
            .field("base", &self.base)
            .field("session_id", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl JsonApiSession {
    /// Reads the service content and logs in
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Transport` if the endpoint cannot be reached
    /// or answers unexpectedly, `ConnectionError::Authentication` if the
    /// credentials are rejected.
    pub fn login(params: LoginParams<'_>) -> ConnectionResult<Self> {
        let transport = |reason: String| ConnectionError::Transport {
            endpoint: params.host.to_string(),
            reason,
        };

        let http = Client::builder()
            .danger_accept_invalid_certs(params.accept_invalid_certs)
            .build()
            .map_err(|e| transport(e.to_string()))?;
        let base = format!("https://{}/sdk/vim25/{}", params.host, params.release);

        let response = http
            .get(format!("{base}/ServiceInstance/ServiceInstance/content"))
            .send()
            .map_err(|e| transport(e.to_string()))?;
        let content = decode_body(response).map_err(|e| transport(e.to_string()))?;
        let content = ServiceContent::from_json(&content).map_err(|e| transport(e.to_string()))?;

        let response = http
            .post(format!(
                "{base}/SessionManager/{}/Login",
                content.session_manager.value
            ))
            .json(&json!({
                "userName": params.user,
                "password": params.password.expose_secret(),
            }))
            .send()
            .map_err(|e| transport(e.to_string()))?;

        if !response.status().is_success() {
            let reason = fault_from_response(response).to_string();
            return Err(ConnectionError::Authentication {
                user: params.user.to_string(),
                endpoint: params.host.to_string(),
                reason,
            });
        }

        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| SecretString::from(v.to_string()))
            .ok_or_else(|| transport(format!("login response carried no {SESSION_HEADER}")))?;

        tracing::debug!(
            host = %params.host,
            api_version = %content.about.api_version,
            "vSphere JSON API session opened"
        );

        Ok(Self {
            http,
            host: params.host.to_string(),
            base,
            session_id,
            content,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(SESSION_HEADER, self.session_id.expose_secret())
    }

    fn file_request(&self, builder: RequestBuilder) -> RequestBuilder {
        self.authorized(builder).header(
            reqwest::header::COOKIE,
            format!("{SESSION_COOKIE}=\"{}\"", self.session_id.expose_secret()),
        )
    }

    fn file_url(&self, file: &DatastoreFile) -> VimResult<Url> {
        let mut url = Url::parse(&format!("https://{}/", self.host))
            .map_err(|e| VimError::Decode(e.to_string()))?;
        url.set_path(&format!("folder/{}", file.path));
        url.query_pairs_mut()
            .append_pair("dcPath", &file.datacenter_path)
            .append_pair("dsName", &file.datastore);
        Ok(url)
    }
}

impl VimSession for JsonApiSession {
    fn endpoint(&self) -> &str {
        &self.host
    }

    fn service_content(&self) -> &ServiceContent {
        &self.content
    }

    fn property(&self, obj: &ManagedObjectRef, name: &str) -> VimResult<Value> {
        let url = format!("{}/{}/{}/{}", self.base, obj.kind, obj.value, name);
        let response = self
            .authorized(self.http.get(url))
            .send()
            .map_err(|e| VimError::Http(e.to_string()))?;
        decode_body(response)
    }

    fn invoke(&self, obj: &ManagedObjectRef, method: &str, args: Value) -> VimResult<Value> {
        let url = format!("{}/{}/{}/{}", self.base, obj.kind, obj.value, method);
        tracing::trace!(target_obj = %obj, method, "invoking remote method");
        let response = self
            .authorized(self.http.post(url))
            .json(&args)
            .send()
            .map_err(|e| VimError::Http(e.to_string()))?;
        decode_body(response)
    }

    fn upload(&self, target: &DatastoreFile, source: &Path) -> VimResult<()> {
        let file = File::open(source)
            .map_err(|e| VimError::Http(format!("cannot open {}: {e}", source.display())))?;
        let response = self
            .file_request(self.http.put(self.file_url(target)?))
            .body(file)
            .send()
            .map_err(|e| VimError::Http(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(fault_from_response(response))
        }
    }

    fn download(&self, source: &DatastoreFile, target: &Path) -> VimResult<()> {
        let mut response = self
            .file_request(self.http.get(self.file_url(source)?))
            .send()
            .map_err(|e| VimError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fault_from_response(response));
        }
        let mut file = File::create(target)
            .map_err(|e| VimError::Http(format!("cannot create {}: {e}", target.display())))?;
        response
            .copy_to(&mut file)
            .map_err(|e| VimError::Http(e.to_string()))?;
        Ok(())
    }

    fn content_length(&self, file: &DatastoreFile) -> VimResult<u64> {
        let response = self
            .file_request(self.http.head(self.file_url(file)?))
            .send()
            .map_err(|e| VimError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fault_from_response(response));
        }
        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| {
                VimError::Decode(format!("no content length for {}", file.datastore_path()))
            })
    }

    fn logout(&self) -> VimResult<()> {
        let url = format!(
            "{}/SessionManager/{}/Logout",
            self.base, self.content.session_manager.value
        );
        let response = self
            .authorized(self.http.post(url))
            .send()
            .map_err(|e| VimError::Http(e.to_string()))?;
        if response.status().is_success() {
            tracing::debug!(host = %self.host, "vSphere JSON API session closed");
            Ok(())
        } else {
            Err(fault_from_response(response))
        }
    }
}

fn decode_body(response: Response) -> VimResult<Value> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(VimError::NotAuthenticated);
    }
    if !status.is_success() {
        return Err(fault_from_response(response));
    }
    if status == StatusCode::NO_CONTENT {
        return Ok(Value::Null);
    }
    let text = response.text().map_err(|e| VimError::Http(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|e| VimError::Decode(e.to_string()))
}

fn fault_from_response(response: Response) -> VimError {
    let status = response.status();
    let body: Option<Value> = response.text().ok().and_then(|t| serde_json::from_str(&t).ok());
    match body {
        Some(fault) if fault.get("_typeName").is_some() => VimError::Fault {
            fault: fault["_typeName"].as_str().unwrap_or("Fault").to_string(),
            message: fault_message(&fault),
        },
        _ => VimError::Http(format!(
            "HTTP {} - {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        )),
    }
}

fn fault_message(fault: &Value) -> String {
    if let Some(message) = fault.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    fault
        .get("faultMessage")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .filter_map(|m| m.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "no message".to_string())
}
