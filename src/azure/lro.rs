//! Long running operation polling.
//!
//! ARM signals asynchronous work in one of three ways, checked in order:
//!
//! 1. an `Azure-AsyncOperation` header: poll that URL until its `status` is
//!    terminal, then fetch the final resource;
//! 2. a `Location` header: poll that URL until it stops answering `202`;
//! 3. for `PUT`/`PATCH`, a non-terminal `properties.provisioningState` in the
//!    body: poll the resource itself.
//!
//! The delay between polls is taken from `Retry-After` when ARM sends one,
//! otherwise from the client's configured poll interval.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use super::client::{ArmClient, ArmResponse};
use super::error::ArmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Failed,
}

fn outcome(status: &str) -> Option<Outcome> {
    if status.eq_ignore_ascii_case("Succeeded") {
        Some(Outcome::Succeeded)
    } else if status.eq_ignore_ascii_case("Failed") || status.eq_ignore_ascii_case("Canceled") {
        Some(Outcome::Failed)
    } else {
        None
    }
}

fn provisioning_state(body: Option<&Value>) -> Option<&str> {
    body?
        .get("properties")?
        .get("provisioningState")?
        .as_str()
}

fn operation_failed(status: &str, body: Option<&Value>) -> ArmError {
    let error = body.and_then(|b| b.get("error"));
    let field = |name: &str| {
        error
            .and_then(|e| e.get(name))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    ArmError::OperationFailed {
        status: status.to_string(),
        code: field("code"),
        message: field("message"),
    }
}

fn next_delay(client: &ArmClient, response: &ArmResponse) -> Duration {
    response.retry_after().unwrap_or_else(|| client.poll_interval())
}

/// Wait for the operation started by `response` to finish.
///
/// Returns the final body: the resource for `PUT`/`PATCH`, the action result
/// for `POST`, nothing for `DELETE`.
pub(crate) async fn wait(
    client: &ArmClient,
    method: Method,
    path: &str,
    api_version: &str,
    response: ArmResponse,
) -> Result<Option<Value>, ArmError> {
    let location = response.header("Location").map(str::to_string);

    if let Some(operation_url) = response.header("Azure-AsyncOperation").map(str::to_string) {
        let mut delay = next_delay(client, &response);
        loop {
            tokio::time::sleep(delay).await;
            let poll = client.get_url(&operation_url).await?;
            let status = poll
                .body
                .as_ref()
                .and_then(|b| b.get("status"))
                .and_then(Value::as_str)
                .unwrap_or("InProgress")
                .to_string();
            tracing::debug!(status = %status, "Polled async operation");
            match outcome(&status) {
                Some(Outcome::Succeeded) => break,
                Some(Outcome::Failed) => return Err(operation_failed(&status, poll.body.as_ref())),
                None => delay = next_delay(client, &poll),
            }
        }
        return final_result(client, &method, path, api_version, location.as_deref()).await;
    }

    if let (Some(location), 201 | 202) = (location.as_deref(), response.status) {
        let mut delay = next_delay(client, &response);
        loop {
            tokio::time::sleep(delay).await;
            let poll = client.get_url(location).await?;
            tracing::debug!(status = poll.status, "Polled operation location");
            if poll.status != 202 {
                if poll.body.is_some() || method == Method::DELETE {
                    return Ok(poll.body);
                }
                return final_result(client, &method, path, api_version, None).await;
            }
            delay = next_delay(client, &poll);
        }
    }

    if method == Method::PUT || method == Method::PATCH {
        let pending = provisioning_state(response.body.as_ref())
            .map(|state| outcome(state).is_none())
            .unwrap_or(response.status == 201 || response.status == 202);
        if pending {
            return poll_provisioning_state(client, path, api_version).await;
        }
        if let Some(state) = provisioning_state(response.body.as_ref()) {
            if outcome(state) == Some(Outcome::Failed) {
                return Err(operation_failed(state, response.body.as_ref()));
            }
        }
    }

    Ok(response.body)
}

async fn final_result(
    client: &ArmClient,
    method: &Method,
    path: &str,
    api_version: &str,
    location: Option<&str>,
) -> Result<Option<Value>, ArmError> {
    if *method == Method::PUT || *method == Method::PATCH {
        client.get(path, api_version).await
    } else if *method == Method::POST {
        match location {
            Some(location) => Ok(client.get_url(location).await?.body),
            None => Ok(None),
        }
    } else {
        Ok(None)
    }
}

async fn poll_provisioning_state(
    client: &ArmClient,
    path: &str,
    api_version: &str,
) -> Result<Option<Value>, ArmError> {
    loop {
        tokio::time::sleep(client.poll_interval()).await;
        let Some(body) = client.get(path, api_version).await? else {
            continue;
        };
        let state = provisioning_state(Some(&body)).unwrap_or("Succeeded").to_string();
        tracing::debug!(provisioning_state = %state, "Polled resource");
        match outcome(&state) {
            Some(Outcome::Succeeded) => return Ok(Some(body)),
            Some(Outcome::Failed) => return Err(operation_failed(&state, Some(&body))),
            None => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::client::tests::client_for;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RESOURCE: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.EventHub/namespaces/ns1";

    #[test]
    fn test_outcome() {
        assert_eq!(outcome("succeeded"), Some(Outcome::Succeeded));
        assert_eq!(outcome("Canceled"), Some(Outcome::Failed));
        assert_eq!(outcome("Updating"), None);
    }

    #[tokio::test]
    async fn test_async_operation_header() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let operation = format!("{}/operations/op1", server.uri());

        Mock::given(method("PUT"))
            .and(path(RESOURCE))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("Azure-AsyncOperation", operation.as_str())
                    .insert_header("Retry-After", "0")
                    .set_body_json(json!({"properties": {"provisioningState": "Created"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "InProgress"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RESOURCE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "ns1",
                "properties": {"provisioningState": "Succeeded"}
            })))
            .mount(&server)
            .await;

        let body = client
            .put_and_wait(RESOURCE, "2024-01-01", &json!({}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["name"], "ns1");
    }

    #[tokio::test]
    async fn test_failed_operation_surfaces_error() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let operation = format!("{}/operations/op2", server.uri());

        Mock::given(method("DELETE"))
            .respond_with(
                ResponseTemplate::new(202)
                    .insert_header("Azure-AsyncOperation", operation.as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operations/op2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Failed",
                "error": {"code": "Conflict", "message": "namespace is locked"}
            })))
            .mount(&server)
            .await;

        let err = client.delete_and_wait(RESOURCE, "2024-01-01").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "long running operation Failed with error: Conflict: namespace is locked"
        );
    }

    #[tokio::test]
    async fn test_location_header_delete() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        let location = format!("{}/operationResults/op3", server.uri());

        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(202).insert_header("Location", location.as_str()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operationResults/op3"))
            .respond_with(ResponseTemplate::new(202))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/operationResults/op3"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        client.delete_and_wait(RESOURCE, "2024-01-01").await.unwrap();
    }

    #[tokio::test]
    async fn test_provisioning_state_polling() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {"provisioningState": "Updating"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RESOURCE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {"provisioningState": "Updating"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(RESOURCE))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {"provisioningState": "Succeeded"}
            })))
            .mount(&server)
            .await;

        let body = client
            .put_and_wait(RESOURCE, "2024-01-01", &json!({}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["properties"]["provisioningState"], "Succeeded");
    }

    #[tokio::test]
    async fn test_synchronous_put() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "hub1",
                "properties": {"partitionCount": 2}
            })))
            .mount(&server)
            .await;

        let body = client
            .put_and_wait(RESOURCE, "2024-01-01", &json!({}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(body["properties"]["partitionCount"], 2);
    }
}
