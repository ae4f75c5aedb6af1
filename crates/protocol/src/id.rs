use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Parameter name for the bucket in a flattened [`UploadId`].
pub const PARAM_BUCKET: &str = "bucket";
/// Parameter name for the object key in a flattened [`UploadId`].
pub const PARAM_KEY: &str = "key";
/// Parameter name for the service-issued upload id in a flattened [`UploadId`].
pub const PARAM_UPLOAD_ID: &str = "uploadId";

/// Identifies one multipart upload on the remote service.
///
/// This is the only thing a caller needs to keep in order to resume an
/// interrupted upload later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadId {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

impl UploadId {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }

    /// Rebuilds an id from the flat map produced by [`to_params`](Self::to_params).
    ///
    /// Extra entries are ignored.
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, ProtocolError> {
        let get = |name: &'static str| {
            params
                .get(name)
                .cloned()
                .ok_or(ProtocolError::MissingParam(name))
        };
        Ok(Self {
            bucket: get(PARAM_BUCKET)?,
            key: get(PARAM_KEY)?,
            upload_id: get(PARAM_UPLOAD_ID)?,
        })
    }

    /// Flattens the id into a key-value map.
    pub fn to_params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (PARAM_BUCKET.to_string(), self.bucket.clone()),
            (PARAM_KEY.to_string(), self.key.clone()),
            (PARAM_UPLOAD_ID.to_string(), self.upload_id.clone()),
        ])
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.bucket, self.key, self.upload_id)
    }
}
