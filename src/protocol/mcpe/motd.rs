use std::fmt;
use std::str::FromStr;

use crate::error::codec::{DecodeError, DecodeErrorKind};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gamemode {
    Survival = 0,
    Creative,
    Adventure,
    Spectator,
}

impl Gamemode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gamemode::Survival => "Survival",
            Gamemode::Creative => "Creative",
            Gamemode::Adventure => "Adventure",
            Gamemode::Spectator => "Spectator",
        }
    }

    fn from_id(id: u8) -> Self {
        match id {
            1 => Gamemode::Creative,
            2 => Gamemode::Adventure,
            3 => Gamemode::Spectator,
            _ => Gamemode::Survival,
        }
    }
}

impl fmt::Display for Gamemode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Protocol wise, the motd is just the `server_id` string of the
/// [`UnconnectedPong`](crate::protocol::packet::offline::UnconnectedPong).
/// This struct gives its `;` separated fields names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Motd {
    /// The name of the server
    pub name: String,
    /// The protocol version
    pub protocol: u16,
    /// The version of the server
    pub version: String,
    /// The number of players online
    pub player_count: u16,
    /// The maximum number of players
    pub player_max: u16,
    /// The gamemode of the server
    pub gamemode: Gamemode,
    /// The server's GUID
    pub server_guid: u64,
    /// The server's port
    pub port: String,
    /// The IPv6 port
    pub ipv6_port: String,
}

impl Motd {
    pub fn new<S: Into<String>>(server_guid: u64, port: S) -> Self {
        Self {
            name: "Rak Server".into(),
            player_count: 0,
            player_max: 100,
            protocol: 448,
            gamemode: Gamemode::Survival,
            version: "1.18.0".into(),
            server_guid,
            port: port.into(),
            ipv6_port: "19133".into(),
        }
    }

    /// Takes the Motd and renders it as the MCPE advertisement string.
    pub fn write(&self) -> String {
        let props: Vec<String> = vec![
            "MCPE".into(),
            self.name.clone(),
            self.protocol.to_string(),
            self.version.clone(),
            self.player_count.to_string(),
            self.player_max.to_string(),
            self.server_guid.to_string(),
            "rak-transport".to_string(),
            self.gamemode.as_str().to_string(),
            self.gamemode.to_string(),
            self.port.to_string(),
            self.ipv6_port.to_string(),
        ];
        props.join(";")
    }
}

fn invalid(what: &'static str) -> DecodeError {
    DecodeError::new(0, DecodeErrorKind::Invalid(what))
}

fn number<T: FromStr>(parts: &[&str], index: usize, what: &'static str) -> Result<T, DecodeError> {
    parts
        .get(index)
        .and_then(|part| part.parse::<T>().ok())
        .ok_or_else(|| invalid(what))
}

impl FromStr for Motd {
    type Err = DecodeError;

    fn from_str(motd: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = motd.split(';').collect();
        if parts.len() < 12 {
            return Err(invalid("motd has too few fields"));
        }
        Ok(Motd {
            name: parts[1].to_string(),
            protocol: number(&parts, 2, "invalid motd protocol")?,
            version: parts[3].to_string(),
            player_count: number(&parts, 4, "invalid motd player count")?,
            player_max: number(&parts, 5, "invalid motd player maximum")?,
            server_guid: number(&parts, 6, "invalid motd server guid")?,
            gamemode: Gamemode::from_id(number(&parts, 9, "invalid motd gamemode")?),
            port: parts[10].to_string(),
            ipv6_port: parts[11].to_string(),
        })
    }
}

impl fmt::Display for Motd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_and_parses() {
        let mut motd = Motd::new(42, "19132");
        motd.gamemode = Gamemode::Creative;
        let text = motd.write();
        assert!(text.starts_with("MCPE;Rak Server;448;1.18.0;0;100;42;rak-transport;Creative;1;"));
        assert_eq!(text.parse::<Motd>().unwrap(), motd);
    }

    #[test]
    fn rejects_short_strings() {
        assert!("MCPE;name".parse::<Motd>().is_err());
        assert!("MCPE;a;x;1;0;0;0;s;Survival;0;1;2".parse::<Motd>().is_err());
    }
}
