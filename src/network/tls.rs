//! TLS configuration for the socket transport.
//!
//! Each party owns an X.509 certificate at `<ssl_dir>/Party<id>.crt`
//! with its private key at `<ssl_dir>/Party<id>.key`; every party
//! certificate in the directory is trusted as a root. Dialing sides
//! verify the accepting peer's certificate against the hostname
//! `"Party<peer_id>"`. The protocol version is pinned to TLS 1.2.

use std::path::Path;
use std::sync::Arc;

use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{self, ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::{Error, Result};
use crate::network::PartyId;

/// TLS material shared by all connections of one party.
#[derive(Clone)]
pub struct TlsContext {
    connector: TlsConnector,
    acceptor: TlsAcceptor,
}

fn tls_err(what: &str, err: impl std::fmt::Display) -> Error {
    Error::Transport(format!("tls: {what}: {err}"))
}

fn party_certs(ssl_dir: &Path, id: PartyId) -> Result<Vec<CertificateDer<'static>>> {
    let path = ssl_dir.join(format!("Party{id}.crt"));
    CertificateDer::pem_file_iter(&path)
        .map_err(|e| tls_err(&format!("reading {}", path.display()), e))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| tls_err(&format!("parsing {}", path.display()), e))
}

impl TlsContext {
    /// Loads keys and certificates for `my_pid` from `ssl_dir`.
    pub fn load(ssl_dir: &Path, my_pid: PartyId, n_parties: usize) -> Result<Self> {
        let mut roots = RootCertStore::empty();
        for peer in 0..n_parties {
            for cert in party_certs(ssl_dir, peer)? {
                roots.add(cert).map_err(|e| tls_err("adding root", e))?;
            }
        }

        let my_chain = party_certs(ssl_dir, my_pid)?;
        let key_path = ssl_dir.join(format!("Party{my_pid}.key"));
        let my_key = PrivateKeyDer::from_pem_file(&key_path)
            .map_err(|e| tls_err(&format!("reading {}", key_path.display()), e))?;

        let client = ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS12])
            .with_root_certificates(roots)
            .with_no_client_auth();

        let server = ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS12])
            .with_no_client_auth()
            .with_single_cert(my_chain, my_key)
            .map_err(|e| tls_err("server certificate", e))?;

        Ok(Self {
            connector: TlsConnector::from(Arc::new(client)),
            acceptor: TlsAcceptor::from(Arc::new(server)),
        })
    }

    /// Connector used when dialing `peer`, verifying its hostname.
    pub fn connector(&self) -> TlsConnector {
        self.connector.clone()
    }

    /// Acceptor used for inbound connections.
    pub fn acceptor(&self) -> TlsAcceptor {
        self.acceptor.clone()
    }

    /// The hostname a peer certificate must carry.
    pub fn server_name(peer: PartyId) -> Result<ServerName<'static>> {
        ServerName::try_from(format!("Party{peer}"))
            .map_err(|e| tls_err("peer name", e))
    }
}
