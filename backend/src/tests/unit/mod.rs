mod dispatcher;
mod reactor;
