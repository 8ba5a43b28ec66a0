//! Device profiles: register map and flash layout of each supported family.
use std::fmt;

use anyhow::Result;
use serde::Deserialize;

/// Device family, with the register map shared by all its variants
#[derive(Debug, Clone, Deserialize)]
pub struct Family {
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "parse_number")]
    icsp_key: u32,
    icsp_key_bits: u8,
    #[serde(deserialize_with = "parse_number")]
    tblpag_addr: u32,
    #[serde(deserialize_with = "parse_number")]
    nvmcon_addr: u32,
    #[serde(deserialize_with = "parse_number")]
    visi_addr: u32,
    #[serde(deserialize_with = "parse_number")]
    start_addr: u32,
    #[serde(deserialize_with = "parse_number")]
    device_id_addr: u32,
    #[serde(deserialize_with = "parse_number")]
    nvmcon_erase_all: u32,
    #[serde(deserialize_with = "parse_number")]
    nvmcon_write_row: u32,
    #[serde(deserialize_with = "parse_number")]
    nvmcon_write_word: u32,
    #[serde(deserialize_with = "parse_number")]
    nvmcon_writing: u32,
    config_words: u8,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variant {
    pub name: String,
    #[serde(deserialize_with = "parse_number")]
    config_words_start: u32,
    /// Overrides the family's config word count
    #[serde(default)]
    config_words: Option<u8>,
}

/// Everything the programmer needs to know about a target device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub name: String,
    /// Bit pattern clocked in to enter ICSP mode
    pub icsp_key: u32,
    pub icsp_key_bits: u8,
    /// TBLPAG register address
    pub tblpag_addr: u32,
    /// NVMCON register address
    pub nvmcon_addr: u32,
    /// VISI register address
    pub visi_addr: u32,
    /// The PC is regularly reset to this address to keep it from running away
    pub start_addr: u32,
    pub device_id_addr: u32,
    /// NVMCON pattern to erase all program memory
    pub nvmcon_erase_all: u32,
    /// NVMCON pattern to write a row
    pub nvmcon_write_row: u32,
    /// NVMCON pattern to write a single word
    pub nvmcon_write_word: u32,
    /// Set in NVMCON while a flash operation is in progress
    pub nvmcon_writing: u32,
    /// Word address of the first config word
    pub config_words_start: u32,
    pub config_words: u8,
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (config words: {} @ 0x{:06x})",
            self.name, self.config_words, self.config_words_start
        )
    }
}

impl DeviceProfile {
    /// First address that may not be row-programmed: the start of the row
    /// holding the config words
    pub const fn row_limit(&self) -> u32 {
        self.config_words_start - self.config_words_start % crate::constants::ROW_SIZE
    }

    /// Last address still treated as part of the config word region
    pub const fn config_words_end(&self) -> u32 {
        self.config_words_start + 2 * self.config_words as u32
    }
}

impl Family {
    fn profile(&self, variant: &Variant) -> DeviceProfile {
        DeviceProfile {
            name: variant.name.clone(),
            icsp_key: self.icsp_key,
            icsp_key_bits: self.icsp_key_bits,
            tblpag_addr: self.tblpag_addr,
            nvmcon_addr: self.nvmcon_addr,
            visi_addr: self.visi_addr,
            start_addr: self.start_addr,
            device_id_addr: self.device_id_addr,
            nvmcon_erase_all: self.nvmcon_erase_all,
            nvmcon_write_row: self.nvmcon_write_row,
            nvmcon_write_word: self.nvmcon_write_word,
            nvmcon_writing: self.nvmcon_writing,
            config_words_start: variant.config_words_start,
            config_words: variant.config_words.unwrap_or(self.config_words),
        }
    }
}

pub struct DeviceDB {
    families: Vec<Family>,
}

impl DeviceDB {
    pub fn load() -> Result<Self> {
        Ok(DeviceDB {
            families: vec![serde_yaml::from_str(include_str!(
                "../devices/PIC24FJ-GB0XX.yaml"
            ))?],
        })
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    /// Names of all known devices
    pub fn names(&self) -> Vec<&str> {
        self.families
            .iter()
            .flat_map(|f| f.variants.iter().map(|v| v.name.as_str()))
            .collect()
    }

    /// Looks up a device by its exact name
    pub fn find(&self, name: &str) -> Result<DeviceProfile> {
        for family in &self.families {
            if let Some(variant) = family.variants.iter().find(|v| v.name == name) {
                log::debug!("Found device {} in family {}", name, family.name);
                return Ok(family.profile(variant));
            }
        }
        let known = self
            .names()
            .iter()
            .map(|n| format!(" * {}", n))
            .collect::<Vec<_>>()
            .join("\n");
        anyhow::bail!("Unknown device: {}\n\nKnown devices:\n{}", name, known)
    }
}

fn parse_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = serde::Deserialize::deserialize(deserializer)?;
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| serde::de::Error::custom(format!("error while parsing {:?}: {}", s, e)))
}
