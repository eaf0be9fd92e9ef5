//! Connection facade and SecurityManager verdict tests

#[cfg(test)]
mod tests {
    use super::super::test_utils::*;
    use crate::config::{Config, SubscribePolicy};
    use crate::error::{AuthHookError, ParseError};
    use crate::metrics::HookMetrics;
    use crate::security::acl::policy::{REASON_FOREIGN_DEVICE, REASON_NO_MATCH, REASON_NO_TOPICS};
    use crate::security::audit::{AuditAction, AuditOutcome};
    use crate::security::auth::{AuthorizationProvider, IdentityProvider, WorkerCredentials};
    use crate::security::connection::{REASON_BLACKLISTED, REASON_NOT_AUTHENTICATED};
    use crate::security::identity::{ApiVersion, SecretType};
    use crate::security::store::ProjectKeySet;
    use crate::security::{
        SecurityManager, Verdict, REASON_STORE_UNAVAILABLE, REASON_UNPARSEABLE,
    };

    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const FOREIGN_EVT_TOPIC: &str =
        "/iot-2/type/device/id/v1:pid999:aircon:0xbeef/evt/boom/fmt/json";

    #[tokio::test]
    async fn test_open_connection_exposes_identity() {
        let manager = test_manager(seeded_store());

        let connection = manager
            .open_connection(DEVICE_USERNAME, PROJECT_KEY)
            .await
            .unwrap();

        assert_eq!(connection.api_version(), ApiVersion::V1);
        assert_eq!(connection.project_id(), PROJECT_ID);
        assert_eq!(connection.device_id(), "0xbeef");
        assert_eq!(connection.secret_type(), &SecretType::Project);
        assert_eq!(connection.identity().product_name(), "aircon");
        assert!(connection.authenticated());
        assert!(!connection.blacklisted());
        assert!(connection.ensure_authenticated().is_ok());
    }

    #[tokio::test]
    async fn test_facade_topic_checks() {
        let manager = test_manager(seeded_store());
        let connection = manager
            .open_connection(DEVICE_USERNAME, PROJECT_KEY)
            .await
            .unwrap();

        assert!(connection.check_publish(EVT_TOPIC).is_allowed());
        assert_eq!(
            connection.check_subscribe(&[EVT_TOPIC]).denial_reason(),
            Some(REASON_NO_MATCH)
        );

        assert!(connection.check_subscribe(&[CMD_TOPIC]).is_allowed());
        assert_eq!(
            connection.check_publish(CMD_TOPIC).denial_reason(),
            Some(REASON_NO_MATCH)
        );
    }

    #[tokio::test]
    async fn test_parse_failure_never_reaches_store() {
        let counting = Arc::new(CountingStore::new(seeded_store()));
        let manager = test_manager(counting.clone());

        let err = manager
            .open_connection("v1:pid123:aircon", PROJECT_KEY)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthHookError::Parse(ParseError::MalformedUsername)));

        let err = manager
            .open_connection(DEVICE_USERNAME, "p:abc:extra")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthHookError::Parse(ParseError::MalformedPassword)));

        let verdict = manager.authorize_register("v2:pid123:aircon:0xbeef", PROJECT_KEY).await;
        assert_eq!(verdict, Verdict::Error(REASON_UNPARSEABLE.to_string()));

        assert_eq!(counting.calls(), 0);
    }

    #[tokio::test]
    async fn test_register_project_key() {
        let manager = test_manager(seeded_store());

        assert_eq!(
            manager.authorize_register(DEVICE_USERNAME, PROJECT_KEY).await,
            Verdict::Ok
        );
    }

    #[tokio::test]
    async fn test_register_wrong_project_key() {
        let store = seeded_store();
        store.upsert_project(ProjectKeySet::new(PROJECT_ID).with_key("p:xyz"));
        let manager = test_manager(store);

        assert_eq!(
            manager.authorize_register(DEVICE_USERNAME, PROJECT_KEY).await,
            Verdict::Error(REASON_NOT_AUTHENTICATED.to_string())
        );
    }

    #[tokio::test]
    async fn test_register_device_password() {
        let manager = test_manager(seeded_store());

        let verdict = manager
            .authorize_register(DEVICE_USERNAME, &format!("d:{}", DEVICE_PASSWORD))
            .await;
        assert!(verdict.is_ok());
    }

    #[tokio::test]
    async fn test_register_blacklisted_device() {
        let store = seeded_store();
        store.blacklist_device(PROJECT_ID, "0xbeef");
        let manager = test_manager(store);

        assert_eq!(
            manager.authorize_register(DEVICE_USERNAME, PROJECT_KEY).await,
            Verdict::Error(REASON_BLACKLISTED.to_string())
        );
    }

    #[tokio::test]
    async fn test_register_store_failure() {
        let manager = test_manager(Arc::new(FailingStore));

        let verdict = manager.authorize_register(DEVICE_USERNAME, PROJECT_KEY).await;

        assert_eq!(
            verdict,
            Verdict::InfrastructureError(REASON_STORE_UNAVAILABLE.to_string())
        );
        assert_eq!(verdict.label(), "infrastructure_error");
        assert_eq!(
            manager
                .metrics()
                .register_total
                .with_label_values(&["infrastructure_error"])
                .get(),
            1
        );
        assert_eq!(manager.metrics().store_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_worker_register() {
        let counting = Arc::new(CountingStore::new(seeded_store()));
        let manager = test_manager(counting.clone());

        assert!(manager.authorize_register(WORKER_USERNAME, WORKER_SECRET).await.is_ok());
        assert_eq!(
            manager.authorize_register(WORKER_USERNAME, "guess").await,
            Verdict::Error(REASON_NOT_AUTHENTICATED.to_string())
        );
        assert_eq!(counting.calls(), 0);
    }

    #[tokio::test]
    async fn test_worker_disabled_without_secret() {
        let manager = SecurityManager::new(
            &Config::default(),
            seeded_store(),
            WorkerCredentials::new(WORKER_USERNAME, None),
            HookMetrics::new().unwrap(),
        )
        .unwrap();

        assert!(!manager.authorize_register(WORKER_USERNAME, "").await.is_ok());
        // Without a secret the worker name is just an unparseable username
        assert_eq!(
            manager.authorize_publish(WORKER_USERNAME, EVT_TOPIC),
            Verdict::Error(REASON_UNPARSEABLE.to_string())
        );
    }

    #[tokio::test]
    async fn test_worker_bypasses_topic_checks() {
        let manager = test_manager(seeded_store());

        assert!(manager.authorize_publish(WORKER_USERNAME, "$SYS/anything").is_ok());
        assert!(manager.authorize_publish(WORKER_USERNAME, CMD_TOPIC).is_ok());
        assert!(manager
            .authorize_subscribe(WORKER_USERNAME, &["#", EVT_TOPIC])
            .is_ok());
    }

    #[test]
    fn test_publish_verdicts() {
        let manager = test_manager(seeded_store());

        assert!(manager.authorize_publish(DEVICE_USERNAME, EVT_TOPIC).is_ok());
        assert_eq!(
            manager.authorize_publish(DEVICE_USERNAME, CMD_TOPIC),
            Verdict::Error(REASON_NO_MATCH.to_string())
        );
        assert_eq!(
            manager.authorize_publish(DEVICE_USERNAME, FOREIGN_EVT_TOPIC),
            Verdict::Error(REASON_FOREIGN_DEVICE.to_string())
        );
        assert_eq!(
            manager.authorize_publish("not-a-device", EVT_TOPIC),
            Verdict::Error(REASON_UNPARSEABLE.to_string())
        );

        let metrics = manager.metrics();
        assert_eq!(metrics.acl_checks_total.with_label_values(&["publish", "ok"]).get(), 1);
        assert_eq!(metrics.acl_checks_total.with_label_values(&["publish", "error"]).get(), 3);
    }

    #[test]
    fn test_loose_identity_match_allows_foreign_topic() {
        let mut config = Config::default();
        config.acl.enforce_identity_match = false;
        let manager = test_manager_with_config(&config, seeded_store());

        assert!(manager.authorize_publish(DEVICE_USERNAME, FOREIGN_EVT_TOPIC).is_ok());
    }

    #[test]
    fn test_subscribe_verdicts() {
        let manager = test_manager(seeded_store());
        let empty: [&str; 0] = [];

        assert!(manager.authorize_subscribe(DEVICE_USERNAME, &[CMD_TOPIC]).is_ok());
        assert_eq!(
            manager.authorize_subscribe(DEVICE_USERNAME, &[CMD_TOPIC, EVT_TOPIC]),
            Verdict::Error(REASON_NO_MATCH.to_string())
        );
        assert_eq!(
            manager.authorize_subscribe(DEVICE_USERNAME, &empty),
            Verdict::Error(REASON_NO_TOPICS.to_string())
        );
    }

    #[test]
    fn test_first_filter_policy() {
        let mut config = Config::default();
        config.acl.subscribe_policy = SubscribePolicy::FirstFilter;
        let manager = test_manager_with_config(&config, seeded_store());

        assert!(manager
            .authorize_subscribe(DEVICE_USERNAME, &[CMD_TOPIC, "#"])
            .is_ok());
        assert!(!manager
            .authorize_subscribe(DEVICE_USERNAME, &["#", CMD_TOPIC])
            .is_ok());
    }

    #[tokio::test]
    async fn test_audit_events_recorded() {
        let sink = Arc::new(RecordingAuditSink::default());
        let manager = test_manager(seeded_store()).with_audit_sink(sink.clone());

        manager.authorize_register(DEVICE_USERNAME, PROJECT_KEY).await;
        manager.authorize_register(DEVICE_USERNAME, "p:nope").await;
        // Allowed publish is not recorded with default audit settings
        manager.authorize_publish(DEVICE_USERNAME, EVT_TOPIC);
        manager.authorize_publish(DEVICE_USERNAME, CMD_TOPIC);

        let events = sink.events();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].action, AuditAction::Register);
        assert_eq!(events[0].outcome, AuditOutcome::Allowed);
        assert_eq!(events[0].principal, DEVICE_USERNAME);

        assert_eq!(events[1].outcome, AuditOutcome::Denied);
        assert_eq!(events[1].detail.as_deref(), Some(REASON_NOT_AUTHENTICATED));

        assert_eq!(events[2].action, AuditAction::Publish);
        assert_eq!(
            events[2].detail.as_deref(),
            Some(format!("{}: {}", REASON_NO_MATCH, CMD_TOPIC).as_str())
        );
    }

    #[tokio::test]
    async fn test_audit_disabled() {
        let mut config = Config::default();
        config.audit.enabled = false;

        let sink = Arc::new(RecordingAuditSink::default());
        let manager = test_manager_with_config(&config, seeded_store()).with_audit_sink(sink.clone());

        manager.authorize_register(DEVICE_USERNAME, "p:nope").await;

        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_custom_password_verifier() {
        use crate::security::auth::PasswordVerifier;

        struct AcceptAll;

        impl PasswordVerifier for AcceptAll {
            fn verify(&self, _password: &str, _passhash: &str) -> crate::Result<bool> {
                Ok(true)
            }
        }

        let manager = test_manager(seeded_store()).with_password_verifier(Arc::new(AcceptAll));

        assert!(manager
            .authorize_register(DEVICE_USERNAME, "d:anything")
            .await
            .is_ok());
        // The verifier only runs for known devices
        assert!(!manager
            .authorize_register("v1:pid123:aircon:0xdead", "d:anything")
            .await
            .is_ok());
    }
}
