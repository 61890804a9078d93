use gamemaster_chain::CredentialError;
use gamemaster_runner::config::GamemasterConfig;
use gamemaster_runner::{Server, StartupError};

#[tokio::test]
async fn test_missing_credential_is_fatal() {
    let mut config = GamemasterConfig::default();
    config.server.port = 0;

    assert!(matches!(
        Server::start(&config).await,
        Err(StartupError::BadCredential(CredentialError::Missing))
    ));
}

#[tokio::test]
async fn test_malformed_credential_is_fatal() {
    let mut config = GamemasterConfig::default();
    config.server.port = 0;
    config.chain.operator_account = Some("0x1234".to_string());

    assert!(matches!(
        Server::start(&config).await,
        Err(StartupError::BadCredential(CredentialError::Malformed(_)))
    ));
}

#[tokio::test]
async fn test_valid_credential_starts_without_touching_the_node() {
    let mut config = GamemasterConfig::default();
    config.server.port = 0;
    config.chain.rpc_endpoint = "http://127.0.0.1:1".to_string();
    config.chain.operator_account =
        Some("0x00000000000000000000000000000000000000aa".to_string());

    let server = Server::start(&config).await.unwrap();
    assert!(server.registry().is_empty().await);
    server.shutdown().await;
}

#[tokio::test]
async fn test_port_in_use_is_fatal() {
    let first = Server::start(&GamemasterConfig::debug(0)).await.unwrap();
    let taken = GamemasterConfig::debug(first.local_addr().port());

    assert!(matches!(
        Server::start(&taken).await,
        Err(StartupError::Bind { .. })
    ));
    first.shutdown().await;
}
