//! Weather roll vocabulary. The roll itself happens on the server; the client
//! only validates what it asks for.

use std::str::FromStr;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    Plain,
    Hills,
    Mountain,
    Coast,
    Desert,
    Forest,
    Sea,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    pub fn as_wire(&self) -> &'static str {
        match self {
            Season::Spring => "primavera",
            Season::Summer => "estate",
            Season::Autumn => "autunno",
            Season::Winter => "inverno",
        }
    }
}

impl Zone {
    pub const ALL: [Zone; 7] = [
        Zone::Plain,
        Zone::Hills,
        Zone::Mountain,
        Zone::Coast,
        Zone::Desert,
        Zone::Forest,
        Zone::Sea,
    ];

    pub fn as_wire(&self) -> &'static str {
        match self {
            Zone::Plain => "pianura",
            Zone::Hills => "collina",
            Zone::Mountain => "montagna",
            Zone::Coast => "costa",
            Zone::Desert => "deserto",
            Zone::Forest => "foresta",
            Zone::Sea => "mare",
        }
    }
}

impl FromStr for Season {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primavera" | "spring" => Ok(Season::Spring),
            "estate" | "summer" => Ok(Season::Summer),
            "autunno" | "autumn" | "fall" => Ok(Season::Autumn),
            "inverno" | "winter" => Ok(Season::Winter),
            _ => Err(ClientError::InvalidWeather(s.to_string())),
        }
    }
}

impl FromStr for Zone {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pianura" | "plain" | "plains" => Ok(Zone::Plain),
            "collina" | "hills" | "hill" => Ok(Zone::Hills),
            "montagna" | "mountain" | "mountains" => Ok(Zone::Mountain),
            "costa" | "coast" => Ok(Zone::Coast),
            "deserto" | "desert" => Ok(Zone::Desert),
            "foresta" | "forest" => Ok(Zone::Forest),
            "mare" | "sea" => Ok(Zone::Sea),
            _ => Err(ClientError::InvalidWeather(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_languages() {
        assert_eq!("Inverno".parse::<Season>().unwrap(), Season::Winter);
        assert_eq!("autumn".parse::<Season>().unwrap(), Season::Autumn);
        assert_eq!(" MARE ".parse::<Zone>().unwrap(), Zone::Sea);
        assert_eq!("hills".parse::<Zone>().unwrap(), Zone::Hills);
    }

    #[test]
    fn test_unknown_rejected() {
        assert_eq!("monsone".parse::<Season>(), Err(ClientError::InvalidWeather("monsone".into())));
        assert!("palude".parse::<Zone>().is_err());
    }

    #[test]
    fn test_wire_names_round_trip() {
        for s in Season::ALL {
            assert_eq!(s.as_wire().parse::<Season>().unwrap(), s);
        }
        for z in Zone::ALL {
            assert_eq!(z.as_wire().parse::<Zone>().unwrap(), z);
        }
    }
}
