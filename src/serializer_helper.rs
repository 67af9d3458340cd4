pub mod serialize_rights {
    use crate::core::segment::Rights;
    use serde::{Deserialize, Deserializer, Serializer};
    pub fn serialize<S>(flags: &Rights, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(flags.bits())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Rights, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u8::deserialize(deserializer)?;
        Rights::from_bits(bits).ok_or_else(|| serde::de::Error::custom("invalid rights bitflags"))
    }
}
