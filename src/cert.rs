use der::{asn1::Ia5String, Encode as _};
use sha2::Sha256;
use time::{OffsetDateTime, PrimitiveDateTime};
use x509_cert::{
    builder::{Builder, RequestBuilder as CsrBuilder},
    der::DecodePem as _,
    ext::pkix::{name::GeneralName, SubjectAltName},
    name::Name,
};
use zeroize::Zeroizing;

use crate::{
    error::{Error, Result},
    key::KeyPair,
};

fn encoding_err(err: impl std::fmt::Display) -> Error {
    Error::OutputEncoding(err.to_string())
}

/// Makes a fresh RSA private key and returns it as PKCS#8 PEM.
///
/// 2048 bits is the accepted minimum for certificate keys.
pub fn create_rsa_key(bits: usize) -> Result<Zeroizing<String>> {
    let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), bits)
        .map_err(|err| Error::Signing(err.to_string()))?;
    KeyPair::Rsa(key).to_pem()
}

/// Makes a fresh P-256 private key and returns it as PKCS#8 PEM.
pub fn create_p256_key() -> Result<Zeroizing<String>> {
    let key = ecdsa::SigningKey::from(p256::SecretKey::random(&mut rand::thread_rng()));
    KeyPair::Ecdsa(key).to_pem()
}

/// Creates a DER-encoded PKCS#10 CSR signed with `key`.
///
/// The first domain becomes the subject CN; every domain is listed in the
/// Subject Alternative Name extension.
pub(crate) fn create_csr(key: &KeyPair, domains: &[String]) -> Result<Vec<u8>> {
    let primary_domain = domains
        .first()
        .ok_or_else(|| Error::InvalidOptions("at least one domain is required".to_owned()))?;
    let subject = format!("CN={primary_domain}")
        .parse::<Name>()
        .map_err(encoding_err)?;

    let san = SubjectAltName(
        domains
            .iter()
            .map(|domain| Ia5String::new(domain).map(GeneralName::DnsName))
            .collect::<Result<_, _>>()
            .map_err(encoding_err)?,
    );

    let der = match key {
        KeyPair::Rsa(key) => {
            let signer = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
            let mut csr = CsrBuilder::new(subject, &signer).map_err(encoding_err)?;
            csr.add_extension(&san).map_err(encoding_err)?;
            csr.build::<rsa::pkcs1v15::Signature>()
                .map_err(encoding_err)?
                .to_der()
                .map_err(encoding_err)?
        }

        KeyPair::Ecdsa(key) => {
            let mut csr = CsrBuilder::new(subject, key).map_err(encoding_err)?;
            csr.add_extension(&san).map_err(encoding_err)?;
            csr.build::<p256::ecdsa::DerSignature>()
                .map_err(encoding_err)?
                .to_der()
                .map_err(encoding_err)?
        }
    };

    Ok(der)
}

/// Wraps a DER certificate as PEM, 64 characters per line.
pub(crate) fn cert_der_to_pem(der: &[u8]) -> Result<String> {
    pem::encode_string("CERTIFICATE", pem::LineEnding::LF, der).map_err(encoding_err)
}

/// The artifacts of one successful issuance run.
///
/// Persisting these is the caller's job; the bundle is immutable once
/// produced and is never written anywhere by this crate.
#[derive(Debug, Clone)]
pub struct CertificateBundle {
    certificate: String,
    private_key_pem: Zeroizing<String>,
    ca_certificate: String,
}

impl CertificateBundle {
    pub(crate) fn new(
        certificate: String,
        private_key_pem: Zeroizing<String>,
        ca_certificate: String,
    ) -> Self {
        CertificateBundle {
            certificate,
            private_key_pem,
            ca_certificate,
        }
    }

    /// The issued certificate in PEM format.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// The domain private key in PEM format, as supplied by the caller.
    pub fn private_key(&self) -> &str {
        &self.private_key_pem
    }

    /// The issuer (CA) certificate in PEM format.
    pub fn ca_certificate(&self) -> &str {
        &self.ca_certificate
    }

    /// Counts the number of whole valid days left on the certificate.
    ///
    /// It is up to the CA how long a certificate is valid; Let's Encrypt
    /// issues for 90 days, which this reports as 89 on a fresh certificate
    /// since it counts whole days. Expired certificates give negative
    /// numbers.
    pub fn valid_days_left(&self) -> Result<i64> {
        let cert =
            x509_cert::Certificate::from_pem(self.certificate.as_str()).map_err(encoding_err)?;

        let not_after = cert.tbs_certificate.validity.not_after.to_date_time();
        let not_after = PrimitiveDateTime::try_from(not_after)
            .map_err(encoding_err)?
            .assume_utc();

        let diff = not_after - OffsetDateTime::now_utc();

        Ok(diff.whole_days())
    }
}
