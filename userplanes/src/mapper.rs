//! Translation between the userplane document and the PGW/SGW profile schemas.
//!
//! Outbound create payloads are strict: a missing field fails the whole
//! payload. Outbound patch payloads are best effort and omit whatever the
//! request does not carry. Inbound reads validate every field the merged
//! document needs before anything is produced.

use crate::config::TacEncoding;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapperError {
    #[error("malformed userplane document: {0}")]
    Malformed(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("unknown userplane function: {0}")]
    InvalidFunction(String),

    #[error("invalid TAC: {0}")]
    InvalidTac(String),

    #[error("invalid APN-NI: {0}")]
    InvalidApnNi(String),
}

/// Which backends take part in a userplane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Saegwu,
    Pgwu,
    Sgwu,
}

impl Function {
    pub fn as_str(&self) -> &'static str {
        match self {
            Function::Saegwu => "SAEGWU",
            Function::Pgwu => "PGWU",
            Function::Sgwu => "SGWU",
        }
    }

    pub fn uses_pgw(&self) -> bool {
        matches!(self, Function::Saegwu | Function::Pgwu)
    }

    pub fn uses_sgw(&self) -> bool {
        matches!(self, Function::Saegwu | Function::Sgwu)
    }

    /// Reads and validates the `function` member of a raw request body.
    pub fn from_body(body: &Value) -> Result<Self, MapperError> {
        match body.get("function") {
            Some(Value::String(function)) => function.parse(),
            Some(other) => Err(MapperError::InvalidFunction(other.to_string())),
            None => Err(MapperError::MissingField("function")),
        }
    }
}

impl FromStr for Function {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SAEGWU" => Ok(Function::Saegwu),
            "PGWU" => Ok(Function::Pgwu),
            "SGWU" => Ok(Function::Sgwu),
            other => Err(MapperError::InvalidFunction(other.to_string())),
        }
    }
}

/// Tracking area code as carried in the userplane document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tac {
    Number(u64),
    Text(String),
}

impl fmt::Display for Tac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tac::Number(n) => write!(f, "{n}"),
            Tac::Text(s) => f.write_str(s),
        }
    }
}

/// Converts a document TAC into the string the backends store.
///
/// With [`TacEncoding::Integer`] the value must fit in 16 bits and is written
/// as lowercase hex.
pub fn encode_tac(tac: &Tac, encoding: TacEncoding) -> Result<String, MapperError> {
    match (encoding, tac) {
        (TacEncoding::Integer, Tac::Number(n)) => u16::try_from(*n)
            .map(|tac| format!("{tac:x}"))
            .map_err(|_| MapperError::InvalidTac(n.to_string())),
        (TacEncoding::Integer, Tac::Text(s)) => Err(MapperError::InvalidTac(s.clone())),
        (TacEncoding::String, tac) => Ok(tac.to_string()),
    }
}

/// Converts a backend TAC string back into its document form.
pub fn decode_tac(tac: &str, encoding: TacEncoding) -> Result<Tac, MapperError> {
    match encoding {
        TacEncoding::Integer => u16::from_str_radix(tac, 16)
            .map(|tac| Tac::Number(u64::from(tac)))
            .map_err(|_| MapperError::InvalidTac(tac.to_string())),
        TacEncoding::String => Ok(Tac::Text(tac.to_string())),
    }
}

/// Compound access point name, `<apn>.mnc<MNC>.mcc<MCC>.gprs`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnNi {
    pub apn: String,
    pub mnc: String,
    pub mcc: String,
}

impl FromStr for ApnNi {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MapperError::InvalidApnNi(s.to_string());

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 4 {
            return Err(invalid());
        }

        // "mnc" and "mcc" labels are three characters wide
        let mnc = parts[1].get(3..).ok_or_else(invalid)?;
        let mcc = parts[2].get(3..).ok_or_else(invalid)?;

        Ok(ApnNi {
            apn: parts[0].to_string(),
            mnc: mnc.to_string(),
            mcc: mcc.to_string(),
        })
    }
}

impl fmt::Display for ApnNi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.mnc{}.mcc{}.gprs", self.apn, self.mnc, self.mcc)
    }
}

/// Userplane document exchanged with API clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Userplane {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<UserplaneConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectors: Option<Vec<Selector>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserplaneConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s5u_pgw: Option<UpInterface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s5u_sgw: Option<UpInterface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s1u: Option<UpInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_ip_address: Option<String>,
}

impl UpInterface {
    fn new(up_ip_address: String) -> Self {
        Self {
            up_ip_address: Some(up_ip_address),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uli: Option<Uli>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdn: Option<Pdn>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Uli {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tai: Option<Tai>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tai {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tac: Option<Tac>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pdn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apns: Option<Vec<String>>,
}

impl Userplane {
    /// Decodes a raw request body into a userplane document.
    pub fn from_body(body: &Value) -> Result<Self, MapperError> {
        Userplane::deserialize(body).map_err(|e| MapperError::Malformed(e.to_string()))
    }

    fn s5u_pgw_ip(&self) -> Option<&str> {
        self.config.as_ref()?.s5u_pgw.as_ref()?.up_ip_address.as_deref()
    }

    fn s5u_sgw_ip(&self) -> Option<&str> {
        self.config.as_ref()?.s5u_sgw.as_ref()?.up_ip_address.as_deref()
    }

    fn s1u_ip(&self) -> Option<&str> {
        self.config.as_ref()?.s1u.as_ref()?.up_ip_address.as_deref()
    }

    fn first_selector(&self) -> Option<&Selector> {
        self.selectors.as_ref()?.first()
    }

    fn tac(&self) -> Option<&Tac> {
        self.first_selector()?.uli.as_ref()?.tai.as_ref()?.tac.as_ref()
    }

    fn apn_ni(&self) -> Result<ApnNi, MapperError> {
        let selector = self
            .first_selector()
            .ok_or(MapperError::MissingField("selectors"))?;
        let network = selector
            .network
            .as_ref()
            .ok_or(MapperError::MissingField("selectors.network"))?;
        let mcc = network
            .mcc
            .as_ref()
            .ok_or(MapperError::MissingField("selectors.network.mcc"))?;
        let mnc = network
            .mnc
            .as_ref()
            .ok_or(MapperError::MissingField("selectors.network.mnc"))?;
        let apn = selector
            .pdn
            .as_ref()
            .and_then(|pdn| pdn.apns.as_ref())
            .and_then(|apns| apns.first())
            .ok_or(MapperError::MissingField("selectors.pdn.apns"))?;

        Ok(ApnNi {
            apn: apn.clone(),
            mnc: mnc.clone(),
            mcc: mcc.clone(),
        })
    }
}

/// Payload of the PGW profile service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PgwProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s5u_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apn_ni: Option<String>,
}

/// Payload of the SGW profile service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SgwProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s5u_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s1u_nat_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s1u_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tac: Option<String>,
}

impl PgwProfile {
    /// Builds the PGW create payload; every field is required.
    pub fn for_create(doc: &Userplane, encoding: TacEncoding) -> Result<Self, MapperError> {
        let uuid = doc.uuid.as_ref().ok_or(MapperError::MissingField("uuid"))?;
        let s5u_ip = doc
            .s5u_pgw_ip()
            .ok_or(MapperError::MissingField("config.s5u_pgw.up_ip_address"))?;
        let apn_ni = doc.apn_ni()?;
        let tac = doc
            .tac()
            .ok_or(MapperError::MissingField("selectors.uli.tai.tac"))?;

        Ok(PgwProfile {
            uuid: Some(uuid.clone()),
            s5u_ip: Some(s5u_ip.to_string()),
            proxy_ip: Some(s5u_ip.to_string()),
            tac: Some(encode_tac(tac, encoding)?),
            apn_ni: Some(apn_ni.to_string()),
        })
    }

    /// Builds a PGW update payload from whatever the document carries.
    pub fn for_patch(doc: &Userplane, encoding: TacEncoding) -> Self {
        let mut profile = PgwProfile {
            uuid: doc.uuid.clone(),
            ..Default::default()
        };

        match doc.s5u_pgw_ip() {
            Some(ip) => {
                profile.s5u_ip = Some(ip.to_string());
                profile.proxy_ip = Some(ip.to_string());
            }
            None => tracing::debug!("Patch without config.s5u_pgw, leaving PGW address unchanged"),
        }

        profile.tac = patch_tac(doc, encoding);

        match doc.apn_ni() {
            Ok(apn_ni) => profile.apn_ni = Some(apn_ni.to_string()),
            Err(e) => tracing::debug!(error = %e, "Patch without a complete APN, leaving apn_ni unchanged"),
        }

        profile
    }
}

impl SgwProfile {
    /// Builds the SGW create payload; every field is required.
    pub fn for_create(doc: &Userplane, encoding: TacEncoding) -> Result<Self, MapperError> {
        let uuid = doc.uuid.as_ref().ok_or(MapperError::MissingField("uuid"))?;
        let s5u_ip = doc
            .s5u_sgw_ip()
            .ok_or(MapperError::MissingField("config.s5u_sgw.up_ip_address"))?;
        let s1u_ip = doc
            .s1u_ip()
            .ok_or(MapperError::MissingField("config.s1u.up_ip_address"))?;
        let tac = doc
            .tac()
            .ok_or(MapperError::MissingField("selectors.uli.tai.tac"))?;

        Ok(SgwProfile {
            uuid: Some(uuid.clone()),
            s5u_ip: Some(s5u_ip.to_string()),
            peer_ip: Some(s5u_ip.to_string()),
            s1u_nat_ip: Some(s5u_ip.to_string()),
            s1u_ip: Some(s1u_ip.to_string()),
            tac: Some(encode_tac(tac, encoding)?),
        })
    }

    /// Builds an SGW update payload from whatever the document carries.
    pub fn for_patch(doc: &Userplane, encoding: TacEncoding) -> Self {
        let mut profile = SgwProfile {
            uuid: doc.uuid.clone(),
            ..Default::default()
        };

        match doc.s5u_sgw_ip() {
            Some(ip) => {
                profile.s5u_ip = Some(ip.to_string());
                profile.peer_ip = Some(ip.to_string());
                profile.s1u_nat_ip = Some(ip.to_string());
            }
            None => tracing::debug!("Patch without config.s5u_sgw, leaving SGW address unchanged"),
        }

        match doc.s1u_ip() {
            Some(ip) => profile.s1u_ip = Some(ip.to_string()),
            None => tracing::debug!("Patch without config.s1u, leaving S1-U address unchanged"),
        }

        profile.tac = patch_tac(doc, encoding);
        profile
    }
}

fn patch_tac(doc: &Userplane, encoding: TacEncoding) -> Option<String> {
    let tac = doc.tac()?;
    match encode_tac(tac, encoding) {
        Ok(tac) => Some(tac),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping TAC in patch");
            None
        }
    }
}

fn required_str<'a>(item: &'a Value, field: &'static str) -> Result<&'a str, MapperError> {
    item.get(field)
        .and_then(Value::as_str)
        .ok_or(MapperError::MissingField(field))
}

fn optional_str(item: &Value, field: &str) -> Option<String> {
    item.get(field).and_then(Value::as_str).map(str::to_string)
}

/// One PGW profile as read back from the PGW service
#[derive(Debug, Clone, PartialEq)]
pub struct PgwRecord {
    pub id: Option<String>,
    pub uuid: String,
    pub s5u_ip: String,
    pub tac: Tac,
    pub apn_ni: ApnNi,
}

impl PgwRecord {
    pub fn from_item(item: &Value, encoding: TacEncoding) -> Result<Self, MapperError> {
        let s5u_ip = required_str(item, "s5u_ip")?;
        let tac = required_str(item, "tac")?;
        let apn_ni = required_str(item, "apn_ni")?;
        let uuid = required_str(item, "uuid")?;

        Ok(PgwRecord {
            id: optional_str(item, "id"),
            uuid: uuid.to_string(),
            s5u_ip: s5u_ip.to_string(),
            tac: decode_tac(tac, encoding)?,
            apn_ni: apn_ni.parse()?,
        })
    }
}

/// One SGW profile as read back from the SGW service
#[derive(Debug, Clone, PartialEq)]
pub struct SgwRecord {
    pub id: Option<String>,
    pub uuid: String,
    pub s5u_ip: String,
    pub s1u_ip: String,
    pub tac: String,
}

impl SgwRecord {
    pub fn from_item(item: &Value) -> Result<Self, MapperError> {
        let s5u_ip = required_str(item, "s5u_ip")?;
        let tac = required_str(item, "tac")?;
        let s1u_ip = required_str(item, "s1u_ip")?;
        let uuid = required_str(item, "uuid")?;

        Ok(SgwRecord {
            id: optional_str(item, "id"),
            uuid: uuid.to_string(),
            s5u_ip: s5u_ip.to_string(),
            s1u_ip: s1u_ip.to_string(),
            tac: tac.to_string(),
        })
    }
}

/// Merges the PGW and SGW halves of one userplane into a document.
///
/// The SGW record is applied last, so its `uuid` and `id` win.
pub fn merge(pgw: PgwRecord, sgw: SgwRecord) -> Userplane {
    let selector = Selector {
        id: pgw.id.clone(),
        network: Some(Network {
            mcc: Some(pgw.apn_ni.mcc),
            mnc: Some(pgw.apn_ni.mnc),
        }),
        uli: Some(Uli {
            tai: Some(Tai { tac: Some(pgw.tac) }),
        }),
        pdn: Some(Pdn {
            apns: Some(vec![pgw.apn_ni.apn]),
        }),
    };

    Userplane {
        uuid: Some(sgw.uuid),
        id: sgw.id.or(pgw.id),
        function: Some(Function::Saegwu.as_str().to_string()),
        config: Some(UserplaneConfig {
            s5u_pgw: Some(UpInterface::new(pgw.s5u_ip)),
            s5u_sgw: Some(UpInterface::new(sgw.s5u_ip)),
            s1u: Some(UpInterface::new(sgw.s1u_ip)),
        }),
        selectors: Some(vec![selector]),
    }
}
