use std::fmt;

use super::message_type::AUTHENTICATION;

// -----------------------------------------------------------------------------
// ----- Method codes ----------------------------------------------------------

pub const AUTH_OK: i32 = 0;
pub const AUTH_KERBEROS_V5: i32 = 2;
pub const AUTH_CLEARTEXT_PASSWORD: i32 = 3;
pub const AUTH_MD5_PASSWORD: i32 = 5;
pub const AUTH_SCM_CREDENTIAL: i32 = 6;
pub const AUTH_GSS: i32 = 7;
pub const AUTH_GSS_CONTINUE: i32 = 8;
pub const AUTH_SSPI: i32 = 9;
pub const AUTH_SASL: i32 = 10;
pub const AUTH_SASL_CONTINUE: i32 = 11;
pub const AUTH_SASL_FINAL: i32 = 12;

// -----------------------------------------------------------------------------
// ----- AuthenticationRequest -------------------------------------------------

/// Decoded `R` message: the 4-byte method code at offset 5 plus whatever the
/// method carries. Only the MD5 salt is kept; other payloads are relayed
/// verbatim and never need decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticationRequest {
    Ok,
    KerberosV5,
    CleartextPassword,
    Md5Password { salt: [u8; 4] },
    ScmCredential,
    Gss,
    GssContinue,
    Sspi,
    Sasl,
    SaslContinue,
    SaslFinal,
    Unknown(i32),
}

// -----------------------------------------------------------------------------
// ----- AuthenticationRequest: Static -----------------------------------------

impl AuthenticationRequest {
    /// Decode an authentication request. `None` when `buf` is not an `R`
    /// message or is too short for its method.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.first() != Some(&AUTHENTICATION) {
            return None;
        }

        let code = buf.get(5..9)?;
        let code = i32::from_be_bytes([code[0], code[1], code[2], code[3]]);

        let request = match code {
            AUTH_OK => Self::Ok,
            AUTH_KERBEROS_V5 => Self::KerberosV5,
            AUTH_CLEARTEXT_PASSWORD => Self::CleartextPassword,
            AUTH_MD5_PASSWORD => {
                let salt = buf.get(9..13)?;
                Self::Md5Password {
                    salt: [salt[0], salt[1], salt[2], salt[3]],
                }
            }
            AUTH_SCM_CREDENTIAL => Self::ScmCredential,
            AUTH_GSS => Self::Gss,
            AUTH_GSS_CONTINUE => Self::GssContinue,
            AUTH_SSPI => Self::Sspi,
            AUTH_SASL => Self::Sasl,
            AUTH_SASL_CONTINUE => Self::SaslContinue,
            AUTH_SASL_FINAL => Self::SaslFinal,
            other => Self::Unknown(other),
        };

        Some(request)
    }
}

// -----------------------------------------------------------------------------
// ----- AuthenticationRequest: Public -----------------------------------------

impl AuthenticationRequest {
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => AUTH_OK,
            Self::KerberosV5 => AUTH_KERBEROS_V5,
            Self::CleartextPassword => AUTH_CLEARTEXT_PASSWORD,
            Self::Md5Password { .. } => AUTH_MD5_PASSWORD,
            Self::ScmCredential => AUTH_SCM_CREDENTIAL,
            Self::Gss => AUTH_GSS,
            Self::GssContinue => AUTH_GSS_CONTINUE,
            Self::Sspi => AUTH_SSPI,
            Self::Sasl => AUTH_SASL,
            Self::SaslContinue => AUTH_SASL_CONTINUE,
            Self::SaslFinal => AUTH_SASL_FINAL,
            Self::Unknown(code) => *code,
        }
    }

    /// Whether the frontend is expected to answer this request.
    /// `Ok` ends the exchange and `SaslFinal` is always followed by `Ok`.
    pub fn solicits_response(&self) -> bool {
        !matches!(self, Self::Ok | Self::SaslFinal)
    }
}

impl fmt::Display for AuthenticationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "AuthenticationOk",
            Self::KerberosV5 => "KerberosV5",
            Self::CleartextPassword => "CleartextPassword",
            Self::Md5Password { .. } => "MD5Password",
            Self::ScmCredential => "SCMCredential",
            Self::Gss => "GSS",
            Self::GssContinue => "GSSContinue",
            Self::Sspi => "SSPI",
            Self::Sasl => "SASL",
            Self::SaslContinue => "SASLContinue",
            Self::SaslFinal => "SASLFinal",
            Self::Unknown(code) => return write!(f, "unknown ({code})"),
        };
        f.write_str(name)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
