use crate::errors::Outcome;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Members of a successful JSON reply; the service adds `result`.
pub type Reply = serde_json::Map<String, Value>;

/// Everything a handler receives from one inbound request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerRequest {
    /// Trailing path segment captured by a `/UUID` template route
    pub id: Option<String>,
    pub query: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Parsed JSON body, for methods that carry one
    pub body: Option<Value>,
}

impl HandlerRequest {
    /// Resource id taken from the request path
    pub fn path_id(&self) -> Result<&str, Outcome> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(Outcome::DispatchNoTarget)
    }

    /// JSON body, which must be an object
    pub fn json_body(&self) -> Result<&Value, Outcome> {
        match &self.body {
            Some(body @ Value::Object(_)) => Ok(body),
            _ => Err(Outcome::InvalidParameter),
        }
    }
}

/// Handler for one method on one userplane resource path
///
/// The handler drives the PGW and SGW calls for its operation and either
/// returns the reply members or the outcome describing why it failed.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: HandlerRequest) -> Result<Reply, Outcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_id() {
        let request = HandlerRequest {
            id: Some("5".to_string()),
            ..Default::default()
        };
        assert_eq!(request.path_id(), Ok("5"));

        let request = HandlerRequest {
            id: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(request.path_id(), Err(Outcome::DispatchNoTarget));
        assert_eq!(
            HandlerRequest::default().path_id(),
            Err(Outcome::DispatchNoTarget)
        );
    }

    #[test]
    fn test_json_body_must_be_object() {
        let request = HandlerRequest {
            body: Some(json!({"function": "SAEGWU"})),
            ..Default::default()
        };
        assert!(request.json_body().is_ok());

        let request = HandlerRequest {
            body: Some(json!([1, 2])),
            ..Default::default()
        };
        assert_eq!(request.json_body(), Err(Outcome::InvalidParameter));
        assert_eq!(
            HandlerRequest::default().json_body(),
            Err(Outcome::InvalidParameter)
        );
    }
}
