//! Texture storage formats.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

macro_rules! texture_formats {
    ($($variant:ident => $name:literal,)*) => {
        /// Internal storage format of a texture, named as in graph metadata.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TextureFormat {
            $($variant,)*
        }

        impl TextureFormat {
            pub const ALL: &'static [TextureFormat] = &[$(Self::$variant,)*];

            /// Identifier used in the `format` metadata key.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }

        impl FromStr for TextureFormat {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)*
                    _ => Err(Error::UnknownFormat(s.to_string())),
                }
            }
        }
    };
}

texture_formats! {
    R8 => "R8",
    Rg8 => "RG8",
    Rgba8 => "RGBA8",
    R16 => "R16",
    Rg16 => "RG16",
    Rgba16 => "RGBA16",
    R16f => "R16F",
    Rg16f => "RG16F",
    Rgba16f => "RGBA16F",
    R32f => "R32F",
    Rg32f => "RG32F",
    Rgba32f => "RGBA32F",
    R8i => "R8I",
    Rg8i => "RG8I",
    Rgba8i => "RGBA8I",
    R16i => "R16I",
    Rg16i => "RG16I",
    Rgba16i => "RGBA16I",
    R32i => "R32I",
    Rg32i => "RG32I",
    Rgba32i => "RGBA32I",
    R8ui => "R8UI",
    Rg8ui => "RG8UI",
    Rgba8ui => "RGBA8UI",
    R16ui => "R16UI",
    Rg16ui => "RG16UI",
    Rgba16ui => "RGBA16UI",
    R32ui => "R32UI",
    Rg32ui => "RG32UI",
    Rgba32ui => "RGBA32UI",
    Rgb10A2 => "RGB10_A2",
    Rgb10A2ui => "RGB10_A2UI",
    R11fG11fB10f => "R11F_G11F_B10F",
    Srgb8Alpha8 => "SRGB8_ALPHA8",
    DepthComponent16 => "DEPTH_COMPONENT16",
    DepthComponent24 => "DEPTH_COMPONENT24",
    DepthComponent32f => "DEPTH_COMPONENT32F",
    Depth24Stencil8 => "DEPTH24_STENCIL8",
    Depth32fStencil8 => "DEPTH32F_STENCIL8",
    StencilIndex8 => "STENCIL_INDEX8",
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Self::DepthComponent16 | Self::DepthComponent24 | Self::DepthComponent32f
        )
    }

    pub fn is_stencil(&self) -> bool {
        matches!(self, Self::StencilIndex8)
    }

    pub fn is_depth_stencil(&self) -> bool {
        matches!(self, Self::Depth24Stencil8 | Self::Depth32fStencil8)
    }

    /// Anything that binds to a color attachment.
    pub fn is_color(&self) -> bool {
        !(self.is_depth() || self.is_stencil() || self.is_depth_stencil())
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
