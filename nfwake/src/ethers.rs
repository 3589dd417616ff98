//! Station lookup: a literal hardware address, or a name from `/etc/ethers`.

use std::{fs, io, path::Path};

use nfwake_wire::StationAddress;

use crate::config::ConfigError;

pub const ETHERS_PATH: &str = "/etc/ethers";

/// Resolves `station` against [`ETHERS_PATH`].
pub fn resolve_station(station: &str) -> Result<StationAddress, ConfigError> {
    resolve_station_in(station, Path::new(ETHERS_PATH))
}

pub fn resolve_station_in(station: &str, ethers: &Path) -> Result<StationAddress, ConfigError> {
    if let Ok(address) = station.parse() {
        return Ok(address);
    }

    let contents = match fs::read_to_string(ethers) {
        Ok(contents) => contents,
        // No database, no names.
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let address = lookup(&contents, station)?
        .ok_or_else(|| ConfigError::UnknownStation(station.to_owned()))?;

    tracing::debug!(station, %address, "station found in ethers database");
    Ok(address)
}

/// Finds `name` in ethers(5) formatted `contents`: one `address hostname` pair per line,
/// `#` starts a comment.
///
/// A matching line with an unparsable address is an error.
pub fn lookup(contents: &str, name: &str) -> Result<Option<StationAddress>, ConfigError> {
    for line in contents.lines() {
        let line = line.split_once('#').map_or(line, |(entry, _)| entry);
        let mut fields = line.split_whitespace();

        let (Some(address), Some(host)) = (fields.next(), fields.next()) else {
            continue;
        };

        if host == name {
            return Ok(Some(address.parse()?));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETHERS: &str = "\
# Wake-on-LAN targets
00:11:22:33:44:55 nas
0:1b:2:3c:4:5d\tdesktop   # short groups
ff:ff:ff:ff:ff:ff
garbage broken
";

    #[test]
    fn literal_addresses_need_no_database() {
        let database = Path::new("/nonexistent/ethers");
        let address = resolve_station_in("00:11:22:33:44:55", database).unwrap();
        assert_eq!(address, StationAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]));
    }

    #[test]
    fn names_are_looked_up() {
        assert_eq!(
            lookup(ETHERS, "nas").unwrap(),
            Some(StationAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]))
        );
        assert_eq!(
            lookup(ETHERS, "desktop").unwrap(),
            Some(StationAddress::new([0x00, 0x1b, 0x02, 0x3c, 0x04, 0x5d]))
        );
        assert_eq!(lookup(ETHERS, "printer").unwrap(), None);
        // Commented out
        assert_eq!(lookup(ETHERS, "Wake-on-LAN").unwrap(), None);
    }

    #[test]
    fn bad_entry_is_an_error() {
        assert!(matches!(lookup(ETHERS, "broken"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn unknown_station_without_database() {
        let err = resolve_station_in("nas", Path::new("/nonexistent/ethers")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStation(name) if name == "nas"));
    }
}
