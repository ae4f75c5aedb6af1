fn main() {
    println!("Run `cargo test -p params-compat` to execute parameter compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;

    use mpu_protocol::{
        CompleteUploadRequest, CompletedPart, CreateUploadRequest, PARAM_BUCKET, PARAM_KEY,
        PARAM_UPLOAD_ID, UploadId, UploadProgress, UploadStatus,
    };
    use mpu_transfer::{TransferState, UploadConfig};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture, re-serializes it, and compares the JSON values
    /// (key order ignored).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  ours:    {reserialized}"
        );
        parsed
    }

    fn params_fixture() -> BTreeMap<String, String> {
        serde_json::from_value(load_fixture("upload_id_params.json"))
            .expect("params fixture is a flat string map")
    }

    // --- Upload identifier params ---

    #[test]
    fn fixture_upload_id_params() {
        let params = params_fixture();
        let id = UploadId::from_params(&params).unwrap();

        assert_eq!(id.bucket, params[PARAM_BUCKET]);
        assert_eq!(id.key, params[PARAM_KEY]);
        assert_eq!(id.upload_id, params[PARAM_UPLOAD_ID]);
        assert_eq!(id.to_params(), params);
    }

    #[test]
    fn upload_id_serializes_like_its_params() {
        let params = params_fixture();
        let id = UploadId::from_params(&params).unwrap();
        let as_json = serde_json::to_value(&id).unwrap();
        assert_eq!(as_json, load_fixture("upload_id_params.json"));
    }

    #[test]
    fn params_missing_any_field_are_rejected() {
        for missing in [PARAM_BUCKET, PARAM_KEY, PARAM_UPLOAD_ID] {
            let mut params = params_fixture();
            params.remove(missing);
            assert!(
                UploadId::from_params(&params).is_err(),
                "params without {missing} should be rejected"
            );
        }
    }

    #[test]
    fn params_ignore_extra_fields() {
        let mut params = params_fixture();
        params.insert("region".into(), "eu-west-1".into());
        let id = UploadId::from_params(&params).unwrap();
        assert_eq!(id.to_params(), params_fixture());
    }

    // --- Completed parts ---

    #[test]
    fn fixture_completed_parts() {
        let parts: Vec<CompletedPart> = roundtrip_test("completed_parts.json");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].checksum, None);
        assert_eq!(parts[2].size, Some(1024));
    }

    #[test]
    fn completed_parts_restore_a_state() {
        let parts: Vec<CompletedPart> =
            serde_json::from_value(load_fixture("completed_parts.json")).unwrap();
        let id = UploadId::from_params(&params_fixture()).unwrap();

        let state = TransferState::with_parts(id, parts.iter().rev().cloned());
        assert_eq!(state.completed_parts(), parts);
        assert_eq!(state.completed_bytes(), 5_242_880 * 2 + 1024);
    }

    // --- Requests and snapshots ---

    #[test]
    fn fixture_create_upload_request() {
        let req: CreateUploadRequest = roundtrip_test("create_upload_request.json");
        assert!(req.part_checksums);
        assert_eq!(
            req.access_policy.as_ref().map(|p| p.as_str()),
            Some("bucket-owner-full-control")
        );
    }

    #[test]
    fn fixture_complete_upload_request() {
        let req: CompleteUploadRequest = roundtrip_test("complete_upload_request.json");
        let numbers: Vec<u32> = req.parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn fixture_upload_progress() {
        let progress: UploadProgress = roundtrip_test("upload_progress.json");
        assert_eq!(progress.status, UploadStatus::FailedResumable);
        assert!(progress.percentage() > 99.0);
    }

    #[test]
    fn fixture_upload_config() {
        let config: UploadConfig = roundtrip_test("upload_config.json");
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.effective_min_part_size(), 8 * 1024 * 1024);
    }
}
