//! Body landmark model (BlazePose topology, 33 points)

use serde::{Deserialize, Serialize};

/// Number of landmarks in the BlazePose topology
pub const LANDMARK_COUNT: usize = 33;

/// Named body part, discriminant is the model output index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyPart {
    /// All parts in model index order
    pub const ALL: [BodyPart; LANDMARK_COUNT] = [
        BodyPart::Nose,
        BodyPart::LeftEyeInner,
        BodyPart::LeftEye,
        BodyPart::LeftEyeOuter,
        BodyPart::RightEyeInner,
        BodyPart::RightEye,
        BodyPart::RightEyeOuter,
        BodyPart::LeftEar,
        BodyPart::RightEar,
        BodyPart::MouthLeft,
        BodyPart::MouthRight,
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftPinky,
        BodyPart::RightPinky,
        BodyPart::LeftIndex,
        BodyPart::RightIndex,
        BodyPart::LeftThumb,
        BodyPart::RightThumb,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftKnee,
        BodyPart::RightKnee,
        BodyPart::LeftAnkle,
        BodyPart::RightAnkle,
        BodyPart::LeftHeel,
        BodyPart::RightHeel,
        BodyPart::LeftFootIndex,
        BodyPart::RightFootIndex,
    ];

    /// Model output index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Look up a part by model output index
    pub fn from_index(index: usize) -> Option<BodyPart> {
        Self::ALL.get(index).copied()
    }
}

/// Segments drawn for the skeleton overlay (torso, arms, legs, head)
pub const SKELETON: [(BodyPart, BodyPart); 18] = [
    (BodyPart::LeftShoulder, BodyPart::RightShoulder),
    (BodyPart::LeftShoulder, BodyPart::LeftHip),
    (BodyPart::RightShoulder, BodyPart::RightHip),
    (BodyPart::LeftHip, BodyPart::RightHip),
    (BodyPart::LeftShoulder, BodyPart::LeftElbow),
    (BodyPart::LeftElbow, BodyPart::LeftWrist),
    (BodyPart::RightShoulder, BodyPart::RightElbow),
    (BodyPart::RightElbow, BodyPart::RightWrist),
    (BodyPart::LeftHip, BodyPart::LeftKnee),
    (BodyPart::LeftKnee, BodyPart::LeftAnkle),
    (BodyPart::RightHip, BodyPart::RightKnee),
    (BodyPart::RightKnee, BodyPart::RightAnkle),
    (BodyPart::Nose, BodyPart::LeftEye),
    (BodyPart::LeftEye, BodyPart::LeftEar),
    (BodyPart::Nose, BodyPart::RightEye),
    (BodyPart::RightEye, BodyPart::RightEar),
    (BodyPart::MouthLeft, BodyPart::MouthRight),
    // Ear to shoulder: the segment the neck angle is measured on
    (BodyPart::LeftEar, BodyPart::LeftShoulder),
];

/// A single landmark in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    /// Horizontal position (0-1, left to right)
    pub x: f32,
    /// Vertical position (0-1, top to bottom)
    pub y: f32,
    /// Relative depth (model units, smaller is closer)
    pub z: f32,
    /// Visibility confidence (0-1)
    pub visibility: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }

    /// Planar (x, y) position
    pub fn xy(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Whether both planar coordinates are finite numbers
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One detected pose: a fixed-size table of optional keypoints
#[derive(Debug, Clone, PartialEq)]
pub struct PoseLandmarks {
    points: [Option<Keypoint>; LANDMARK_COUNT],
}

impl Default for PoseLandmarks {
    fn default() -> Self {
        Self {
            points: [None; LANDMARK_COUNT],
        }
    }
}

impl PoseLandmarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, part: BodyPart, keypoint: Keypoint) -> Self {
        self.set(part, keypoint);
        self
    }

    pub fn set(&mut self, part: BodyPart, keypoint: Keypoint) {
        self.points[part.index()] = Some(keypoint);
    }

    pub fn remove(&mut self, part: BodyPart) -> Option<Keypoint> {
        self.points[part.index()].take()
    }

    pub fn get(&self, part: BodyPart) -> Option<&Keypoint> {
        self.points[part.index()].as_ref()
    }

    /// Present keypoints in model index order
    pub fn iter(&self) -> impl Iterator<Item = (BodyPart, &Keypoint)> {
        BodyPart::ALL
            .iter()
            .zip(self.points.iter())
            .filter_map(|(part, kp)| kp.as_ref().map(|kp| (*part, kp)))
    }

    /// Number of present keypoints
    pub fn len(&self) -> usize {
        self.points.iter().filter(|kp| kp.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
