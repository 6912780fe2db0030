//! Tests for the protocol module
//!
//! These tests pin down the JSON shapes exchanged with node agents and
//! administrative clients, plus input validation.

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde_json::json;

    #[test]
    fn test_start_request_port_is_a_string() {
        let req = StartRequest {
            id: "r1".to_string(),
            binary: "worker".to_string(),
            port: 8001,
            args: vec!["-v".to_string()],
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({"id": "r1", "binary": "worker", "port": "8001", "args": ["-v"]})
        );
    }

    #[test]
    fn test_start_request_accepts_numeric_port() {
        let req: StartRequest =
            serde_json::from_value(json!({"id": "r1", "binary": "w", "port": 8002})).unwrap();
        assert_eq!(req.port, 8002);
        assert!(req.args.is_empty());
    }

    #[test]
    fn test_start_request_rejects_bad_port() {
        let result: std::result::Result<StartRequest, _> =
            serde_json::from_value(json!({"id": "r1", "binary": "w", "port": "eighty"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_replica_json_shape() {
        let replica = Replica::running("abc", "http://n1:9090", 8123);
        let value = serde_json::to_value(&replica).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["node_url"], "http://n1:9090");
        assert_eq!(value["port"], "8123");
        assert_eq!(value["status"], "Running");
        assert!(value["started_at"].is_string());
    }

    #[test]
    fn test_snapshot_running_count_skips_stop_failed() {
        let mut snapshot = ClusterSnapshot::default();
        let running = Replica::running("a", "http://n1", 8000);
        let mut failed = Replica::running("b", "http://n1", 8001);
        failed.status = ReplicaStatus::StopFailed;
        snapshot.replicas.insert(running.id.clone(), running);
        snapshot.replicas.insert(failed.id.clone(), failed);
        assert_eq!(snapshot.running_count(), 1);
    }

    #[test]
    fn test_scale_request_validation() {
        assert_eq!(ScaleRequest { count: 0 }.desired().unwrap(), 0);
        assert_eq!(ScaleRequest { count: 5 }.desired().unwrap(), 5);
        assert!(matches!(
            ScaleRequest { count: -1 }.desired(),
            Err(FleetError::InvalidRequest(_))
        ));
        assert!(ScaleRequest { count: i64::MAX }.desired().is_err());
    }

    #[test]
    fn test_normalize_node_url() {
        assert_eq!(normalize_node_url("http://n1:9090").unwrap(), "http://n1:9090");
        assert_eq!(normalize_node_url(" http://n1:9090/ ").unwrap(), "http://n1:9090");
        assert_eq!(normalize_node_url("http://10.0.0.5").unwrap(), "http://10.0.0.5");
    }

    #[test]
    fn test_normalize_node_url_rejects_invalid() {
        assert!(normalize_node_url("n1:9090").is_err());
        assert!(normalize_node_url("https://n1:9090").is_err());
        assert!(normalize_node_url("http://").is_err());
        assert!(normalize_node_url("http://:9090").is_err());
        assert!(normalize_node_url("http://n1:9090/agent").is_err());
    }

    #[test]
    fn test_error_display() {
        let err = FleetError::AgentCallFailed {
            node: "http://n1".to_string(),
            reason: "HTTP 500".to_string(),
        };
        assert_eq!(err.to_string(), "Agent call to http://n1 failed: HTTP 500");
        assert_eq!(FleetError::NoNodesAvailable.to_string(), "No nodes available for placement");
        assert_eq!(FleetError::NoReplicasAvailable.to_string(), "No available replicas");
    }
}
