//! MongoDB connection bootstrap.

use anyhow::Context;
use bookserver_kernel::settings::DatabaseSettings;
use mongodb::{bson::doc, Client, Database};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is inside the userinfo part of a connection string.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Assemble the connection string from the database settings.
///
/// `uri` takes precedence; otherwise credentials are percent-encoded and
/// spliced in front of the host.
pub fn connection_uri(settings: &DatabaseSettings) -> String {
    if let Some(uri) = &settings.uri {
        return uri.clone();
    }

    let credentials = match (&settings.user, &settings.password) {
        (Some(user), Some(password)) => format!(
            "{}:{}@",
            utf8_percent_encode(user, USERINFO),
            utf8_percent_encode(password, USERINFO)
        ),
        (Some(user), None) => format!("{}@", utf8_percent_encode(user, USERINFO)),
        _ => String::new(),
    };

    let mut uri = format!("{}://{}{}/", settings.scheme, credentials, settings.host);
    if !settings.options.is_empty() {
        uri.push('?');
        uri.push_str(&settings.options);
    }
    uri
}

/// Open the client and verify the deployment answers a ping.
///
/// The returned handle is meant to live for the whole process.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Database> {
    let client = Client::with_uri_str(connection_uri(settings))
        .await
        .with_context(|| format!("invalid MongoDB connection string for host {}", settings.host))?;

    let database = client.database(&settings.name);
    database
        .run_command(doc! { "ping": 1 })
        .await
        .with_context(|| format!("MongoDB at {} did not answer ping", settings.host))?;

    tracing::info!(
        target: "bookserver-db",
        host = %settings.host,
        database = %settings.name,
        "connected to MongoDB"
    );

    Ok(database)
}
