//! Remote sensor roster.

use serde::Deserialize;
use telldus_types::SensorInfo;
use tracing::debug;

use crate::error::RemoteFetchError;
use crate::session::TelldusSession;

pub(crate) const SENSORS_LIST: &str = "sensors/list";

#[derive(Debug, Deserialize)]
struct SensorListResponse {
    // Telldus Live answers with a singular `sensor` key
    #[serde(alias = "sensor", default)]
    sensors: Vec<SensorInfo>,
}

/// List every sensor known to the remote account.
pub async fn list_sensors(
    session: &dyn TelldusSession,
) -> Result<Vec<SensorInfo>, RemoteFetchError> {
    let response = session.get(SENSORS_LIST, &[]).await?;
    let list: SensorListResponse = response.into_json()?;

    debug!("Remote roster has {} sensors", list.sensors.len());
    Ok(list.sensors)
}
