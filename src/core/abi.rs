//! Android ABI identity.
//!
//! The ABI name is the directory name used under an APK's `lib/` folder and
//! the value handed to the NDK toolchain file. Each ABI also maps to the
//! LLVM triple the NDK sysroot uses for its runtime libraries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An Android ABI supported by the NDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AndroidAbi {
    Arm64V8a,
    ArmeabiV7a,
    X86,
    X86_64,
}

impl AndroidAbi {
    /// All ABIs, in the order the NDK documents them.
    pub const ALL: [AndroidAbi; 4] = [
        AndroidAbi::ArmeabiV7a,
        AndroidAbi::Arm64V8a,
        AndroidAbi::X86,
        AndroidAbi::X86_64,
    ];

    /// Directory name under `lib/`, e.g. `arm64-v8a`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AndroidAbi::Arm64V8a => "arm64-v8a",
            AndroidAbi::ArmeabiV7a => "armeabi-v7a",
            AndroidAbi::X86 => "x86",
            AndroidAbi::X86_64 => "x86_64",
        }
    }

    /// Sysroot library triple, e.g. `aarch64-linux-android`.
    pub fn sysroot_triple(&self) -> &'static str {
        match self {
            AndroidAbi::Arm64V8a => "aarch64-linux-android",
            AndroidAbi::ArmeabiV7a => "arm-linux-androideabi",
            AndroidAbi::X86 => "i686-linux-android",
            AndroidAbi::X86_64 => "x86_64-linux-android",
        }
    }
}

impl fmt::Display for AndroidAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AndroidAbi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AndroidAbi::ALL
            .into_iter()
            .find(|abi| abi.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = AndroidAbi::ALL.iter().map(|a| a.as_str()).collect();
                format!("unknown Android ABI `{}`; expected one of: {}", s, known.join(", "))
            })
    }
}

impl TryFrom<String> for AndroidAbi {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AndroidAbi> for String {
    fn from(abi: AndroidAbi) -> Self {
        abi.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrips_directory_names() {
        for abi in AndroidAbi::ALL {
            assert_eq!(abi.as_str().parse::<AndroidAbi>().unwrap(), abi);
        }
    }

    #[test]
    fn test_unknown_abi_lists_choices() {
        let err = "mips".parse::<AndroidAbi>().unwrap_err();
        assert!(err.contains("mips"));
        assert!(err.contains("arm64-v8a"));
    }

    #[test]
    fn test_sysroot_triple() {
        assert_eq!(AndroidAbi::Arm64V8a.sysroot_triple(), "aarch64-linux-android");
        assert_eq!(AndroidAbi::X86.sysroot_triple(), "i686-linux-android");
    }

    #[test]
    fn test_deserialize_from_json_string() {
        let abi: AndroidAbi = serde_json::from_str("\"x86_64\"").unwrap();
        assert_eq!(abi, AndroidAbi::X86_64);
        assert!(serde_json::from_str::<AndroidAbi>("\"sparc\"").is_err());
    }
}
