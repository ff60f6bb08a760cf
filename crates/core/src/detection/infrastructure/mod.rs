pub mod model_resolver;
pub mod onnx_blazeface_detector;
pub mod threaded_detection_solution;
