use anyhow::{Context, Result};
use std::fs::{create_dir_all, File};
use std::io::ErrorKind;
use std::path::Path;
use yocto_api::ApiSettings;

pub fn read(path: &Path) -> Result<ApiSettings> {
    match File::open(path) {
        Ok(reader) => serde_json::from_reader(reader).context(format!(
            "Could not parse settings file at {}",
            path.to_string_lossy()
        )),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(ApiSettings::default()),
        Err(error) => Err(error).context(format!(
            "Could not open settings file for reading at {}",
            path.to_string_lossy()
        )),
    }
}

pub fn write(settings: &ApiSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if let Err(e) = create_dir_all(parent) {
            if e.kind() != ErrorKind::AlreadyExists {
                return Err(e).context(format!(
                    "Could not create settings directory at {}",
                    parent.to_string_lossy()
                ));
            }
        }
    }
    let writer = File::create(path).context(format!(
        "Could not open settings file for writing at {}",
        path.to_string_lossy()
    ))?;
    serde_json::to_writer_pretty(writer, settings).context(format!(
        "Could not write to settings file at {}",
        path.to_string_lossy()
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    #[test]
    fn missing_file_gives_defaults() {
        let path = temp_dir().join("weighscale-demo-missing").join("settings.json");
        assert_eq!(read(&path).unwrap(), ApiSettings::default());
    }

    #[test]
    fn written_settings_are_read_back() {
        let path = temp_dir()
            .join(format!("weighscale-demo-{}", std::process::id()))
            .join("settings.json");
        let settings = ApiSettings {
            hubs: vec![String::from("http://yoctohub.local:4444")],
            poll_interval_ms: 100,
            ..Default::default()
        };

        write(&settings, &path).unwrap();
        assert_eq!(read(&path).unwrap(), settings);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn garbage_is_reported() {
        let dir = temp_dir().join(format!("weighscale-demo-bad-{}", std::process::id()));
        create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(read(&path).is_err());
        let _ = std::fs::remove_dir_all(dir);
    }
}
