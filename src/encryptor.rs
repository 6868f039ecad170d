use crate::config::EncryptionSettings;
use crate::resolver::Password;
use crate::Result;
use log::debug;

#[cfg(feature = "pdf")]
use crate::config::Cipher;
#[cfg(feature = "pdf")]
use crate::error::{DocumentError, EncryptionError};
#[cfg(feature = "pdf")]
use lopdf::encryption::crypt_filters::{Aes128CryptFilter, Aes256CryptFilter, CryptFilter};
#[cfg(feature = "pdf")]
use lopdf::{Document, EncryptionState, EncryptionVersion, Object, StringFormat};
#[cfg(feature = "pdf")]
use std::collections::BTreeMap;
#[cfg(feature = "pdf")]
use std::sync::Arc;

/// Name of the crypt filter used by the AES handlers.
#[cfg(feature = "pdf")]
const CRYPT_FILTER: &[u8] = b"StdCF";

/// Applies password encryption to rendered PDF documents.
#[derive(Clone, Debug, Default)]
pub struct PdfEncryptor {
    settings: EncryptionSettings,
}

impl PdfEncryptor {
    pub fn new(settings: EncryptionSettings) -> PdfEncryptor {
        PdfEncryptor { settings }
    }

    pub fn settings(&self) -> &EncryptionSettings {
        &self.settings
    }

    /// Whether the crate was built with a PDF backend able to encrypt.
    pub fn is_available() -> bool {
        cfg!(feature = "pdf")
    }

    /// Returns `document` untouched when there is no password, otherwise a
    /// copy of its pages encrypted with `password`.
    pub fn encrypt(&self, document: Vec<u8>, password: Option<&Password>) -> Result<Vec<u8>> {
        match password {
            None => {
                debug!("no password, document returned as is");
                Ok(document)
            }
            Some(password) => self.protect(&document, password),
        }
    }

    #[cfg(feature = "pdf")]
    fn protect(&self, document: &[u8], password: &Password) -> Result<Vec<u8>> {
        let source = Document::load_mem(document).map_err(DocumentError::Parse)?;
        if source.is_encrypted() || source.encryption_state.is_some() {
            return Err(EncryptionError::AlreadyEncrypted.into());
        }

        let mut output = crate::pages::copy_pages(source)?;
        output.trailer.set("ID", file_identifier()?);

        let user_password = password.as_str();
        let owner_password = self.settings.owner_password.as_deref().unwrap_or(user_password);
        let permissions = lopdf::Permissions::from_bits_truncate(self.settings.permissions.bits());

        let mut file_encryption_key = [0u8; 32];
        let version = match self.settings.cipher {
            Cipher::Rc4 => EncryptionVersion::V2 {
                document: &output,
                owner_password,
                user_password,
                key_length: 128,
                permissions,
            },
            Cipher::Aes128 => EncryptionVersion::V4 {
                document: &output,
                encrypt_metadata: true,
                crypt_filters: crypt_filters(Arc::new(Aes128CryptFilter)),
                stream_filter: CRYPT_FILTER.to_vec(),
                string_filter: CRYPT_FILTER.to_vec(),
                owner_password,
                user_password,
                permissions,
            },
            Cipher::Aes256 => {
                random_bytes(&mut file_encryption_key)?;
                EncryptionVersion::V5 {
                    encrypt_metadata: true,
                    crypt_filters: crypt_filters(Arc::new(Aes256CryptFilter)),
                    file_encryption_key: &file_encryption_key,
                    stream_filter: CRYPT_FILTER.to_vec(),
                    string_filter: CRYPT_FILTER.to_vec(),
                    owner_password,
                    user_password,
                    permissions,
                }
            }
        };

        let state = EncryptionState::try_from(version).map_err(|err| EncryptionError::State(err.to_string()))?;
        output
            .encrypt(&state)
            .map_err(|err| EncryptionError::Encrypt(err.to_string()))?;

        let mut buffer = Vec::new();
        output
            .save_to(&mut buffer)
            .map_err(|err| EncryptionError::Write(err.to_string()))?;
        debug!(
            "encrypted {} pages with {:?}, {} bytes",
            output.get_pages().len(),
            self.settings.cipher,
            buffer.len()
        );
        Ok(buffer)
    }

    #[cfg(not(feature = "pdf"))]
    fn protect(&self, _document: &[u8], _password: &Password) -> Result<Vec<u8>> {
        log::warn!("PDF encryption requested but the crate was built without the `pdf` feature");
        Err(crate::error::EncryptionError::Unavailable.into())
    }
}

#[cfg(feature = "pdf")]
fn crypt_filters(filter: Arc<dyn CryptFilter>) -> BTreeMap<Vec<u8>, Arc<dyn CryptFilter>> {
    BTreeMap::from([(CRYPT_FILTER.to_vec(), filter)])
}

#[cfg(feature = "pdf")]
fn random_bytes(buffer: &mut [u8]) -> std::result::Result<(), EncryptionError> {
    getrandom::fill(buffer).map_err(|err| EncryptionError::Random(err.to_string()))
}

/// A new pair of identical file identifiers for a freshly created file.
#[cfg(feature = "pdf")]
fn file_identifier() -> std::result::Result<Object, EncryptionError> {
    let mut id = vec![0u8; 16];
    random_bytes(&mut id)?;
    Ok(Object::Array(vec![
        Object::String(id.clone(), StringFormat::Hexadecimal),
        Object::String(id, StringFormat::Hexadecimal),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_password_is_identity() {
        let encryptor = PdfEncryptor::default();
        for document in [Vec::new(), b"not a pdf".to_vec(), b"%PDF-1.4\n%%EOF".to_vec()] {
            assert_eq!(encryptor.encrypt(document.clone(), None).unwrap(), document);
        }
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn garbage_is_malformed() {
        let password = Password::new("secret").unwrap();
        let err = PdfEncryptor::default().encrypt(b"hello".to_vec(), Some(&password)).unwrap_err();
        assert!(matches!(err, crate::Error::MalformedDocument(_)), "{:?}", err);
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn identifiers_are_random() {
        fn bytes(identifier: Object) -> Vec<Vec<u8>> {
            identifier
                .as_array()
                .unwrap()
                .iter()
                .map(|id| match id {
                    Object::String(bytes, StringFormat::Hexadecimal) => bytes.clone(),
                    other => panic!("unexpected identifier {:?}", other),
                })
                .collect()
        }

        let first = bytes(file_identifier().unwrap());
        let second = bytes(file_identifier().unwrap());
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].len(), 16);
        assert_eq!(first[0], first[1]);
        assert_ne!(first, second);
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn unavailable_without_backend() {
        assert!(!PdfEncryptor::is_available());
        let password = Password::new("secret").unwrap();
        let err = PdfEncryptor::default().encrypt(b"%PDF".to_vec(), Some(&password)).unwrap_err();
        assert!(matches!(err, crate::Error::Encryption(crate::error::EncryptionError::Unavailable)));
    }
}
