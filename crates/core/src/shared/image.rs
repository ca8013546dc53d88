use ndarray::ArrayView3;

/// Side length of the placeholder emitted for an empty result bucket.
pub const PLACEHOLDER_SIZE: u32 = 16;

/// Interleaved channel order of an [`Image`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    pub fn swapped(self) -> Self {
        match self {
            ChannelOrder::Rgb => ChannelOrder::Bgr,
            ChannelOrder::Bgr => ChannelOrder::Rgb,
        }
    }
}

/// An 8-bit, 3-channel image in row-major order.
///
/// The channel order travels with the pixels so conversions between the
/// host convention (RGB) and the backend convention (BGR) are explicit.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    data: Vec<u8>,
    width: u32,
    height: u32,
    order: ChannelOrder,
}

impl Image {
    pub const CHANNELS: usize = 3;

    pub fn new(data: Vec<u8>, width: u32, height: u32, order: ChannelOrder) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * Self::CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            order,
        }
    }

    /// Single-colour image with `value` repeated across every channel.
    pub fn filled(width: u32, height: u32, value: u8, order: ChannelOrder) -> Self {
        let len = (width as usize) * (height as usize) * Self::CHANNELS;
        Self::new(vec![value; len], width, height, order)
    }

    /// Black 16x16 sentinel returned in place of an empty image batch.
    pub fn placeholder() -> Self {
        Self::filled(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE, 0, ChannelOrder::Bgr)
    }

    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, ChannelOrder::Rgb)
    }

    /// Converts to an `image` buffer in RGB order, swapping channels if needed.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        let rgb = self.clone().with_order(ChannelOrder::Rgb);
        image::RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Reorders the channels in place when `order` differs from the current one.
    pub fn with_order(mut self, order: ChannelOrder) -> Self {
        if self.order != order {
            for px in self.data.chunks_exact_mut(Self::CHANNELS) {
                px.swap(0, 2);
            }
            self.order = order;
        }
        self
    }

    /// Pixel at (`row`, `col`) as `[r, g, b]` regardless of storage order.
    pub fn rgb_at(&self, row: usize, col: usize) -> [u8; 3] {
        let offset = (row * self.width as usize + col) * Self::CHANNELS;
        let px = &self.data[offset..offset + Self::CHANNELS];
        match self.order {
            ChannelOrder::Rgb => [px[0], px[1], px[2]],
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
        }
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, Self::CHANNELS),
            &self.data,
        )
        .expect("Image data length must match dimensions")
    }

    /// Copies the rectangle `[x, x + width) x [y, y + height)`, clamped to bounds.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Image {
        let x1 = x.min(self.width) as usize;
        let y1 = y.min(self.height) as usize;
        let x2 = x.saturating_add(width).min(self.width) as usize;
        let y2 = y.saturating_add(height).min(self.height) as usize;

        let row_len = self.width as usize * Self::CHANNELS;
        let mut data = Vec::with_capacity((x2 - x1) * (y2 - y1) * Self::CHANNELS);
        for row in y1..y2 {
            let start = row * row_len + x1 * Self::CHANNELS;
            let end = row * row_len + x2 * Self::CHANNELS;
            data.extend_from_slice(&self.data[start..end]);
        }
        Image::new(data, (x2 - x1) as u32, (y2 - y1) as u32, self.order)
    }

    /// Bilinear resize to exactly `width` x `height`, keeping the channel order.
    pub fn resize(&self, width: u32, height: u32) -> Image {
        if self.width == width && self.height == height {
            return self.clone();
        }
        // Resampling is per-channel, so the buffer can be treated as RGB here.
        let Some(buf) = image::RgbImage::from_raw(self.width, self.height, self.data.clone())
        else {
            return Image::filled(width, height, 0, self.order);
        };
        let resized =
            image::imageops::resize(&buf, width, height, image::imageops::FilterType::Triangle);
        Image::new(resized.into_raw(), width, height, self.order)
    }
}
