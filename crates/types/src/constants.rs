pub mod platforms {
    pub const ETHEREUM: &str = "ethereum";
    pub const DEFAULT_HOME_PLATFORM: &str = "home";
}

pub mod hash {
    pub const HASH_SIZE: usize = 32;
    pub const NULL_HASH_BYTES: [u8; HASH_SIZE] = [0u8; HASH_SIZE];
}

pub mod address {
    pub const COMPRESSED_PUBLIC_KEY_SIZE: usize = 33;
    pub const HOME_ADDRESS_SIZE: usize = COMPRESSED_PUBLIC_KEY_SIZE + 1;

    /// Kind byte of a user-owned home-chain address.
    pub const USER_KIND: u8 = 1;
    pub const USER_PREFIX: char = 'P';
}

pub mod assets {
    pub const ETH_SYMBOL: &str = "ETH";
}

pub mod oracle {
    pub const URL_SCHEME: &str = "interop://";
}
