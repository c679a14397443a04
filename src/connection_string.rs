//! Checks of the connection strings handed over on the command line.
//!
//! Parsing is done by the client crates themselves, [`EventHubsConnectionStringProperties`] and
//! [`azure_storage::ConnectionString`], so a string accepted here is read the same way when the
//! clients connect. On top of that the values the clients only need at connect time are required
//! up front, and the endpoint and account name are kept for the banner.

use azeventhubs::EventHubsConnectionStringProperties;
use azure_storage::ConnectionString;
use base64::Engine;

/// What the run needs to know about an Event Hubs connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHubConnectionProperties {
    /// The namespace host, eg. `my-ns.servicebus.windows.net`
    pub fully_qualified_namespace: String,

    /// The event hub named by `EntityPath`, if any
    pub event_hub_name: Option<String>,
}

impl EventHubConnectionProperties {
    /// Parses an Event Hubs connection string of the form
    /// `Endpoint=sb://<ns>.servicebus.windows.net/;SharedAccessKeyName=..;SharedAccessKey=..[;EntityPath=..]`
    /// and checks that it carries an endpoint and credentials
    pub fn parse(connection_string: &str) -> Result<Self, String> {
        let properties =
            EventHubsConnectionStringProperties::parse(connection_string).map_err(|err| err.to_string())?;

        let fully_qualified_namespace = match properties.endpoint() {
            None => return Err("missing 'Endpoint'".to_string()),
            Some(_) => properties
                .fully_qualified_namespace()
                .ok_or("'Endpoint' has no host")?,
        };

        // A signature takes precedence over a key when both are present
        if properties.shared_access_signature().is_none()
            && (properties.shared_access_key_name().is_none()
                || properties.shared_access_key().is_none())
        {
            return Err(
                "expected 'SharedAccessKeyName' and 'SharedAccessKey', or 'SharedAccessSignature'"
                    .to_string(),
            );
        }

        Ok(Self {
            fully_qualified_namespace: fully_qualified_namespace.to_string(),
            event_hub_name: properties.event_hub_name().map(ToString::to_string),
        })
    }

    /// Checks that `EntityPath`, when present, names the same event hub as `event_hub_name`
    pub fn check_event_hub_name(&self, event_hub_name: &str) -> Result<(), String> {
        match &self.event_hub_name {
            Some(entity_path) if entity_path != event_hub_name => Err(format!(
                "'EntityPath' is '{}' but the event hub name is '{}'",
                entity_path, event_hub_name
            )),
            _ => Ok(()),
        }
    }
}

/// What the run needs to know about an Azure Storage connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConnectionProperties {
    /// The storage account name
    pub account_name: String,
}

impl StorageConnectionProperties {
    /// Parses a storage connection string of the form
    /// `DefaultEndpointsProtocol=https;AccountName=..;AccountKey=..` (or with a
    /// `SharedAccessSignature` instead of the key) and checks its account and credentials
    pub fn parse(connection_string: &str) -> Result<Self, String> {
        let properties = ConnectionString::new(connection_string).map_err(|err| err.to_string())?;

        let account_name = properties.account_name.ok_or("missing 'AccountName'")?;
        match (properties.account_key, properties.sas) {
            (_, Some(_)) => {}
            (Some(key), None) => {
                base64::engine::general_purpose::STANDARD
                    .decode(key)
                    .map_err(|_| "'AccountKey' is not valid base64".to_string())?;
            }
            (None, None) => {
                return Err("expected 'AccountKey' or 'SharedAccessSignature'".to_string())
            }
        }

        Ok(Self {
            account_name: account_name.to_string(),
        })
    }
}
