use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::info;
use report_encrypt::{
    Cipher, EncryptionSettings, Password, PasswordResolver, PdfEncryptor, Record, RecordData, ReportConfig,
};
use serde_json::Value as Json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pdfprotect", about = "Password-protect a rendered PDF report", version, author)]
struct Args {
    /// Input PDF file
    #[arg(short, long)]
    input: PathBuf,

    /// Output file; the input is overwritten when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Password typed by the user
    #[arg(short, long, conflicts_with = "expression")]
    password: Option<String>,

    /// Expression computing the password, e.g. "object.vat[-4:]"
    #[arg(short, long)]
    expression: Option<String>,

    /// JSON file with the record bound to `object`:
    /// {"model": "res.partner", "id": 7, "fields": {"vat": "BE0477472701"}}
    #[arg(short, long, requires = "expression")]
    record: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = CipherArg::Rc4)]
    cipher: CipherArg,

    /// Separate owner password
    #[arg(long)]
    owner_password: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CipherArg {
    Rc4,
    Aes128,
    Aes256,
}

impl From<CipherArg> for Cipher {
    fn from(cipher: CipherArg) -> Cipher {
        match cipher {
            CipherArg::Rc4 => Cipher::Rc4,
            CipherArg::Aes128 => Cipher::Aes128,
            CipherArg::Aes256 => Cipher::Aes256,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = EncryptionSettings::builder().cipher(args.cipher.into());
    if let Some(owner_password) = &args.owner_password {
        settings = settings.owner_password(owner_password.as_str());
    }
    let config = match &args.expression {
        Some(expression) => ReportConfig::auto(expression.as_str()),
        None => ReportConfig::manual(),
    }
    .with_settings(settings.build());
    config.validate()?;

    let password = match (&args.password, &args.expression) {
        (Some(password), _) => Password::new(password.as_str()),
        (None, Some(_)) => {
            let record = match &args.record {
                Some(path) => Some(load_record(path)?),
                None => None,
            };
            PasswordResolver::new().resolve(&config, record)?
        }
        (None, None) => bail!("either --password or --expression is required"),
    };

    let document = std::fs::read(&args.input).with_context(|| format!("couldn't read {}", args.input.display()))?;
    let output = args.output.as_ref().unwrap_or(&args.input);
    if password.is_none() {
        info!("no password applies, copying {} unchanged", args.input.display());
    }
    let protected = PdfEncryptor::new(config.settings).encrypt(document, password.as_ref())?;
    std::fs::write(output, protected).with_context(|| format!("couldn't write {}", output.display()))?;
    info!("saved {}", output.display());
    Ok(())
}

fn load_record(path: &PathBuf) -> Result<Arc<dyn Record>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("couldn't read {}", path.display()))?;
    let json: Json = serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Arc::new(record_from_json(&json)?))
}

fn record_from_json(json: &Json) -> Result<RecordData> {
    let model = json
        .get("model")
        .and_then(Json::as_str)
        .context("record needs a string \"model\"")?;
    let id = json.get("id").and_then(Json::as_i64).context("record needs an integer \"id\"")?;
    let mut record = RecordData::new(model, id);

    if let Some(fields) = json.get("fields") {
        let Some(fields) = fields.as_object() else {
            bail!("\"fields\" of {}({}) must be an object", model, id);
        };
        for (name, value) in fields {
            match value {
                Json::Null => record.set(name.as_str(), None::<String>),
                Json::Bool(flag) => record.set(name.as_str(), *flag),
                Json::Number(number) => match number.as_i64() {
                    Some(integer) => record.set(name.as_str(), integer),
                    None => record.set(name.as_str(), number.as_f64().unwrap_or(f64::NAN)),
                },
                Json::String(text) => record.set(name.as_str(), text.as_str()),
                Json::Object(_) => record.set(name.as_str(), record_from_json(value)?),
                Json::Array(_) => bail!("field {:?} of {}({}): lists are not supported", name, model, id),
            }
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_records() {
        let json = serde_json::json!({
            "model": "res.partner",
            "id": 7,
            "fields": {
                "vat": "BE0477472701",
                "credit": 12.5,
                "ref": false,
                "country_id": {"model": "res.country", "id": 21, "fields": {"code": "BE"}}
            }
        });
        let record: Arc<dyn Record> = Arc::new(record_from_json(&json).unwrap());
        let config = ReportConfig::auto("object.country_id.code + object.vat[-4:]");
        let password = PasswordResolver::new().resolve(&config, Some(record)).unwrap().unwrap();
        assert_eq!(password.as_str(), "BE2701");
    }

    #[test]
    fn invalid_records() {
        assert!(record_from_json(&serde_json::json!({"id": 1})).is_err());
        assert!(record_from_json(&serde_json::json!({"model": "res.partner", "id": "1"})).is_err());
        assert!(record_from_json(&serde_json::json!({"model": "res.partner", "id": 1, "fields": {"tags": [1]}})).is_err());
    }
}
