use glam::Vec2;

/// A 2D axis-aligned bounding box represented by minimum and maximum points.
///
/// Coordinates follow image conventions: the origin is the top-left corner
/// and y grows downward, so `min` is the top-left and `max` the bottom-right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bbox {
    /// The top-left corner.
    pub min: Vec2,
    /// The bottom-right corner.
    pub max: Vec2,
}

impl Bbox {
    /// Creates a new bounding box from minimum and maximum points.
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box from corner coordinates `(x1, y1, x2, y2)`.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docparse_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::from_corners(1.0, 2.0, 6.0, 5.0);
    /// assert_eq!(bbox.min, Vec2::new(1.0, 2.0));
    /// assert_eq!(bbox.max, Vec2::new(6.0, 5.0));
    /// ```
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            min: Vec2::new(x1, y1),
            max: Vec2::new(x2, y2),
        }
    }

    /// Creates a new bounding box from a center point and size vector.
    ///
    /// Raw YOLO heads emit boxes as `(center_x, center_y, width, height)`.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docparse_core::analysis::bbox::Bbox;
    /// // Create a bbox centered at (100, 200) with size 50x80
    /// let bbox = Bbox::from_center_size(Vec2::new(100.0, 200.0), Vec2::new(50.0, 80.0));
    /// assert_eq!(bbox.min, Vec2::new(75.0, 160.0));
    /// assert_eq!(bbox.max, Vec2::new(125.0, 240.0));
    /// ```
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half_size = size / 2.0;
        Self {
            min: center - half_size,
            max: center + half_size,
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Calculates the area of the bounding box.
    ///
    /// Inverted boxes (max < min on an axis) have no area.
    ///
    /// # Example
    /// ```
    /// use docparse_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::from_corners(0.0, 0.0, 4.0, 3.0);
    /// assert_eq!(bbox.area(), 12.0);
    /// ```
    pub fn area(&self) -> f32 {
        let length = (self.max - self.min).max(Vec2::ZERO);

        length.x * length.y
    }

    /// Calculates the area of intersection between this bounding box and another.
    ///
    /// Returns 0.0 when the boxes don't overlap.
    ///
    /// # Example
    /// ```
    /// use docparse_core::analysis::bbox::Bbox;
    /// let bbox1 = Bbox::from_corners(0.0, 0.0, 4.0, 4.0);
    /// let bbox2 = Bbox::from_corners(2.0, 2.0, 6.0, 6.0);
    /// assert_eq!(bbox1.intersection(&bbox2), 4.0); // 2x2 intersection area
    /// ```
    pub fn intersection(&self, other: &Self) -> f32 {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);

        if max.x > min.x && max.y > min.y {
            (max.x - min.x) * (max.y - min.y)
        } else {
            0.
        }
    }

    /// Calculates the Intersection over Union (IoU) between this bounding box and another.
    ///
    /// IoU = Intersection Area / (Area1 + Area2 - Intersection Area).
    /// Two zero-area boxes have an IoU of 0.0.
    ///
    /// # Example
    /// ```
    /// use docparse_core::analysis::bbox::Bbox;
    /// let bbox1 = Bbox::from_corners(0.0, 0.0, 2.0, 2.0);
    /// let bbox2 = Bbox::from_corners(0.0, 0.0, 2.0, 2.0);
    /// assert_eq!(bbox1.iou(&bbox2), 1.0); // Identical boxes
    /// ```
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection_area = self.intersection(other);
        let union_area = self.area() + other.area() - intersection_area;

        if union_area > 0.0 {
            intersection_area / union_area
        } else {
            0.0
        }
    }

    /// Multiplies both corners by a uniform factor.
    ///
    /// # Example
    /// ```
    /// use glam::Vec2;
    /// use docparse_core::analysis::bbox::Bbox;
    /// let bbox = Bbox::from_corners(100.0, 100.0, 200.0, 200.0).scale(2.0);
    /// assert_eq!(bbox.min, Vec2::new(200.0, 200.0));
    /// assert_eq!(bbox.max, Vec2::new(400.0, 400.0));
    /// ```
    pub fn scale(&self, factor: f32) -> Self {
        Self {
            min: self.min * factor,
            max: self.max * factor,
        }
    }

    /// Returns `[x, y, width, height]`.
    pub fn to_xywh(&self) -> [f32; 4] {
        [self.min.x, self.min.y, self.width(), self.height()]
    }
}
