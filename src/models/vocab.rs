//! Closed vocabularies for the integer codes used by the server.
//!
//! Every vocabulary is a static two-way table. Codes outside the table fail
//! decoding of the enclosing entity.

use std::fmt;

/// A server code with no entry in its vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCode {
    pub vocabulary: &'static str,
    pub code: i64,
}

impl fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} code {}", self.vocabulary, self.code)
    }
}

impl std::error::Error for UnknownCode {}

macro_rules! closed_vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident = $code:literal => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            const TABLE: &'static [(i64, $name, &'static str)] = &[
                $(($code, $name::$variant, $text)),+
            ];

            /// Every member in declaration order.
            pub fn all() -> impl Iterator<Item = Self> {
                Self::TABLE.iter().map(|(_, member, _)| *member)
            }

            /// Wire code of this member.
            pub fn code(self) -> i64 {
                Self::TABLE
                    .iter()
                    .find(|(_, member, _)| *member == self)
                    .map(|(code, _, _)| *code)
                    .unwrap_or_default()
            }

            /// Display name used by the server UI.
            pub fn name(self) -> &'static str {
                Self::TABLE
                    .iter()
                    .find(|(_, member, _)| *member == self)
                    .map(|(_, _, text)| *text)
                    .unwrap_or_default()
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::TABLE
                    .iter()
                    .find(|(_, _, text)| *text == name)
                    .map(|(_, member, _)| *member)
            }
        }

        impl TryFrom<i64> for $name {
            type Error = UnknownCode;

            fn try_from(code: i64) -> Result<Self, Self::Error> {
                Self::TABLE
                    .iter()
                    .find(|(candidate, _, _)| *candidate == code)
                    .map(|(_, member, _)| *member)
                    .ok_or(UnknownCode {
                        vocabulary: $label,
                        code,
                    })
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.code()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

closed_vocabulary! {
    /// Kind of artist entry.
    ArtistType, "artist type" {
        Other = 0 => "Other",
        Person = 1 => "Person",
        Character = 2 => "Character",
        Group = 3 => "Group",
        Orchestra = 4 => "Orchestra",
        Choir = 5 => "Choir",
    }
}

closed_vocabulary! {
    /// Rendition kind of a track.
    TrackType, "track type" {
        Vocal = 0 => "Vocal",
        OffVocal = 1 => "OffVocal",
        Instrumental = 2 => "Instrumental",
        Dialogue = 3 => "Dialogue",
        Other = 10 => "Other",
    }
}

closed_vocabulary! {
    /// Whether an extra metadata entry is scored at song or artist level.
    MetadataScope, "extra metadata type" {
        Song = 1 => "Song",
        Artist = 2 => "Artist",
    }
}

closed_vocabulary! {
    /// Relation between two artists.
    SongRelationType, "song relation type" {
        Other = 0 => "Other",
        GroupMember = 1 => "GroupMember",
        VoiceActor = 2 => "VoiceActor",
        Person = 3 => "Person",
    }
}
