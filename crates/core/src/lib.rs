pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod projection;
}

pub mod detection {
    pub mod domain {
        pub mod detection;
        pub mod face_detection_solution;
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod domain {
        pub mod capture_input;
    }
    pub mod infrastructure;
}

pub mod overlay {
    pub mod domain {
        pub mod coordinate_mapper;
        pub mod overlay_style;
        pub mod render_error;
    }
    pub mod infrastructure;
}

pub mod display {
    pub mod domain {
        pub mod display_surface;
        pub mod image_writer;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod pipeline_controller;
    pub mod pipeline_factory;
    pub mod pipeline_logger;
    pub mod infrastructure;
}
