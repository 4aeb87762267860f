//! Romanization and translation backends.

pub mod google;
#[cfg(feature = "kuroshiro")]
pub mod kana;

use lyricpipe_core::{CoreError, RomanizationProvider, Romanizer};

pub use google::GoogleTranslateClient;
#[cfg(feature = "kuroshiro")]
pub use kana::KanaRomanizer;

/// Build the romanizer for the configured provider.
///
/// # Errors
///
/// Returns an error if the provider's HTTP client cannot be created, or if
/// `kuroshiro` is requested in a build without the `kuroshiro` feature.
pub fn romanizer_for(provider: RomanizationProvider) -> Result<Box<dyn Romanizer>, CoreError> {
    Ok(match provider {
        #[cfg(feature = "kuroshiro")]
        RomanizationProvider::Kuroshiro => Box::new(KanaRomanizer::new()),
        #[cfg(not(feature = "kuroshiro"))]
        RomanizationProvider::Kuroshiro => {
            return Err(CoreError::ConfigInvalid {
                message: "built without the `kuroshiro` feature, use romanization_provider = \"gcloud\""
                    .into(),
            })
        }
        RomanizationProvider::GCloud => Box::new(GoogleTranslateClient::new()?),
    })
}
