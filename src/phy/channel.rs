//! Operating channel layout: center frequency, width and which 20 MHz
//! sub-channel is the primary one.

use crate::constants::{
    DEFAULT_CENTER_FREQUENCY_MHZ, DEFAULT_CHANNEL_WIDTH_MHZ, SUBCHANNEL_WIDTH_MHZ,
    SUPPORTED_CHANNEL_WIDTHS_MHZ,
};
use crate::error::PhyError;
use crate::phy::band::Band;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub center_frequency_mhz: u32,
    pub channel_width: u16,
    /// Index of the primary 20 MHz channel, counted from the lowest one.
    #[serde(default)]
    pub primary20_index: u8,
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self {
            center_frequency_mhz: DEFAULT_CENTER_FREQUENCY_MHZ,
            channel_width: DEFAULT_CHANNEL_WIDTH_MHZ,
            primary20_index: 0,
        }
    }
}

impl ChannelLayout {
    /// Build a validated layout.
    pub fn new(center_frequency_mhz: u32, channel_width: u16, primary20_index: u8) -> Result<Self, PhyError> {
        let layout = Self {
            center_frequency_mhz,
            channel_width,
            primary20_index,
        };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), PhyError> {
        if !SUPPORTED_CHANNEL_WIDTHS_MHZ.contains(&self.channel_width) {
            return Err(PhyError::InvalidChannel(format!(
                "unsupported channel width {} MHz",
                self.channel_width
            )));
        }
        if self.center_frequency_mhz <= u32::from(self.channel_width) / 2 {
            return Err(PhyError::InvalidChannel(format!(
                "center frequency {} MHz too low for a {} MHz channel",
                self.center_frequency_mhz, self.channel_width
            )));
        }
        if u16::from(self.primary20_index) >= self.subchannel_count() {
            return Err(PhyError::InvalidChannel(format!(
                "primary 20 MHz index {} outside a {} MHz channel",
                self.primary20_index, self.channel_width
            )));
        }
        Ok(())
    }

    /// Number of 20 MHz sub-channels (1 for channels narrower than 20 MHz).
    pub fn subchannel_count(&self) -> u16 {
        (self.channel_width / SUBCHANNEL_WIDTH_MHZ).max(1)
    }

    pub fn is_bonded(&self) -> bool {
        self.channel_width > SUBCHANNEL_WIDTH_MHZ
    }

    /// The `index`-th `width`-wide band of the channel, from the low edge.
    pub fn band(&self, width: u16, index: u16) -> Band {
        let low = self.center_frequency_mhz - u32::from(self.channel_width) / 2
            + u32::from(index) * u32::from(width);
        Band::new(low, low + u32::from(width))
    }

    /// Index of the `width`-wide band that contains the primary 20 MHz channel.
    pub fn primary_band_index(&self, width: u16) -> u16 {
        if width >= self.channel_width || width < SUBCHANNEL_WIDTH_MHZ {
            0
        } else {
            u16::from(self.primary20_index) / (width / SUBCHANNEL_WIDTH_MHZ)
        }
    }

    /// The `width`-wide block that contains the primary 20 MHz channel.
    pub fn primary_block(&self, width: u16) -> Band {
        let width = width.min(self.channel_width);
        self.band(width, self.primary_band_index(width))
    }

    /// The primary channel: 20 MHz wide on bonded channels, the whole channel otherwise.
    pub fn primary_band(&self) -> Band {
        if self.is_bonded() {
            self.band(SUBCHANNEL_WIDTH_MHZ, u16::from(self.primary20_index))
        } else {
            self.band(self.channel_width, 0)
        }
    }

    /// Every 20 MHz sub-channel except the primary one.
    pub fn secondary_bands(&self) -> Vec<Band> {
        if !self.is_bonded() {
            return Vec::new();
        }
        (0..self.subchannel_count())
            .filter(|index| *index != u16::from(self.primary20_index))
            .map(|index| self.band(SUBCHANNEL_WIDTH_MHZ, index))
            .collect()
    }

    /// The 20 MHz sub-channels making up the `width`-wide block around the primary.
    pub fn subchannels_of_block(&self, width: u16) -> Vec<Band> {
        let width = width.min(self.channel_width);
        if width <= SUBCHANNEL_WIDTH_MHZ {
            return vec![self.primary_band()];
        }
        let per_block = width / SUBCHANNEL_WIDTH_MHZ;
        let first = self.primary_band_index(width) * per_block;
        (first..first + per_block)
            .map(|index| self.band(SUBCHANNEL_WIDTH_MHZ, index))
            .collect()
    }
}
