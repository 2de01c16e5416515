pub mod draw;
pub mod seam_carve;
pub mod shapes;
pub mod transform;
