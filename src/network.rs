use std::fmt;

/// The two chains the feed listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    XDai,
    Mainnet,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::XDai, Network::Mainnet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::XDai => "XDAI",
            Network::Mainnet => "MAINNET",
        }
    }

    /// Embed accent color, `0xRRGGBB`.
    pub fn color(&self) -> u32 {
        match self {
            Network::Mainnet => 0x5762cf,
            Network::XDai => 0x48a9a9,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
